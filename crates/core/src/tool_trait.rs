//! Analysis Tool Trait
//!
//! Split definition/execution traits:
//!
//! - `ToolDefinition` - the declared `ToolDescriptor`
//! - `ToolExecutable` - execution against a `ToolContext`
//! - `AnalysisTool` - combined trait (auto-implemented via blanket impl)
//!
//! The orchestrator plans from definitions alone and only touches
//! `ToolExecutable` when an invocation is dispatched.

use async_trait::async_trait;

use crate::context::ToolContext;
use crate::descriptor::ToolDescriptor;
use crate::error::ToolError;
use crate::invocation::ToolOutput;

// ============================================================================
// Trait Definitions
// ============================================================================

/// Declared contract of a tool.
pub trait ToolDefinition: Send + Sync {
    /// The tool's descriptor. Must not change after registration.
    fn descriptor(&self) -> &ToolDescriptor;

    /// Tool identity, shorthand for `descriptor().id`.
    fn id(&self) -> &str {
        &self.descriptor().id
    }
}

/// Tool execution capability.
#[async_trait]
pub trait ToolExecutable: Send + Sync {
    /// Run the tool once.
    ///
    /// Implementations should watch `ctx.cancellation()` for long work; the
    /// coordinator also drops the future on timeout or request cancellation.
    async fn execute(&self, ctx: &ToolContext) -> Result<ToolOutput, ToolError>;
}

/// Combined trait for registered tools.
pub trait AnalysisTool: ToolDefinition + ToolExecutable {}

// Blanket implementation: anything that implements both traits is an AnalysisTool
impl<T: ToolDefinition + ToolExecutable> AnalysisTool for T {}
