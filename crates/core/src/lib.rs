//! Review Cascade Core
//!
//! Foundational models, error types, tool traits and graph layering for the
//! Review Cascade workspace. This crate has no dependency on the async
//! runtime, on LLM providers or on the orchestration services.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`, `ToolError`)
//! - `category` - Category paths, matching and issue-category slugs
//! - `descriptor` - `ToolDescriptor`
//! - `request` - `AnalysisRequest`, `ExecutionStrategy`
//! - `finding` - `RawFinding`, `Finding`, `Location`, `Severity`
//! - `invocation` - `ToolInvocation`, `ToolOutput`, `InvocationState`
//! - `record` - `ExecutionRecord`, `ScoringProfile`
//! - `graph` - Prerequisite layering and cycle detection
//! - `context` - `ExecutionContext`, `ToolContext`
//! - `tool_trait` - `ToolDefinition`, `ToolExecutable`, `AnalysisTool`

pub mod error;
pub mod category;
pub mod descriptor;
pub mod request;
pub mod finding;
pub mod invocation;
pub mod record;
pub mod graph;
pub mod context;
pub mod tool_trait;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult, ToolError};

// ── Models ─────────────────────────────────────────────────────────────
pub use category::{match_category, normalize_issue_category, CategoryMatch};
pub use descriptor::ToolDescriptor;
pub use finding::{Finding, LineRange, Location, RawFinding, Severity};
pub use invocation::{InvocationState, ToolInvocation, ToolOutput};
pub use record::{ExecutionRecord, ScoringProfile};
pub use request::{AnalysisRequest, CategorySelection, ExecutionStrategy, RequestSize};

// ── Graph ──────────────────────────────────────────────────────────────
pub use graph::{layer_graph, transitive_closure};

// ── Context Hierarchy ──────────────────────────────────────────────────
pub use context::{ExecutionContext, ToolContext};

// ── Analysis Tool Trait ────────────────────────────────────────────────
pub use tool_trait::{AnalysisTool, ToolDefinition, ToolExecutable};
