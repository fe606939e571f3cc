//! Review Cascade Tools
//!
//! Everything that sits between the orchestration core and concrete analyzers:
//! - `ToolRegistry` / `RegistrySnapshot` - validated registration and lookup
//! - `FunctionTool` - closure-based tools
//! - `CommandTool` - external analyzer processes
//! - `ReasoningTool` - analyses performed by a reasoning provider
//! - `source` - gitignore-aware snapshot walking and source excerpts
//! - `finding_parser` - lenient JSON finding extraction from tool output
//! - `catalog` - the built-in analyzers and playbooks

pub mod catalog;
pub mod command;
pub mod finding_parser;
pub mod function_tool;
pub mod reasoning;
pub mod registry;
pub mod source;

// Re-export core types
pub use catalog::{builtin_catalog, builtin_descriptors, builtin_reasoning_tools, CatalogEntry};
pub use command::{CommandSpec, CommandTool};
pub use finding_parser::parse_findings;
pub use function_tool::{FunctionTool, ToolFuture};
pub use reasoning::ReasoningTool;
pub use registry::{RegistrySnapshot, ToolRegistry};
pub use source::{snapshot_walker, source_excerpt, SourceExcerpt};
