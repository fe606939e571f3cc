//! Context Hierarchy
//!
//! 1. `ExecutionContext` trait - immutable request-level information
//! 2. `ToolContext` - what a single tool invocation sees
//!
//! Tools only ever receive a `ToolContext`. They cannot reach the registry,
//! the learning store or other invocations; anything they need from earlier
//! tools arrives explicitly through `prerequisite_outputs`.

use std::collections::BTreeMap;

use tokio_util::sync::CancellationToken;

use crate::invocation::ToolOutput;
use crate::request::{AnalysisRequest, CategorySelection};

// ============================================================================
// ExecutionContext Trait
// ============================================================================

/// Read-only request information shared by every scope.
pub trait ExecutionContext: Send + Sync {
    /// Identifier of the request being served.
    fn request_id(&self) -> &str;

    /// Opaque snapshot handle the tools analyze.
    fn snapshot(&self) -> &str;

    /// Categories the request asked for.
    fn categories(&self) -> &CategorySelection;

    /// Project languages, if known.
    fn languages(&self) -> &[String] {
        &[]
    }
}

// ============================================================================
// ToolContext
// ============================================================================

/// Context for one tool invocation.
#[derive(Debug, Clone)]
pub struct ToolContext {
    request_id: String,
    snapshot: String,
    categories: CategorySelection,
    languages: Vec<String>,
    invocation_id: String,
    tool_id: String,
    /// Dispatch attempt, starting at 1
    attempt: u32,
    /// Outputs of this tool's succeeded prerequisites, by tool id
    prerequisite_outputs: BTreeMap<String, ToolOutput>,
    cancellation: CancellationToken,
}

impl ToolContext {
    /// Create a context for `tool_id` serving `request`.
    pub fn new(
        request: &AnalysisRequest,
        invocation_id: impl Into<String>,
        tool_id: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request.id.clone(),
            snapshot: request.snapshot.clone(),
            categories: request.categories.clone(),
            languages: request.languages.clone(),
            invocation_id: invocation_id.into(),
            tool_id: tool_id.into(),
            attempt: 1,
            prerequisite_outputs: BTreeMap::new(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Attach prerequisite outputs.
    pub fn with_prerequisite_outputs(mut self, outputs: BTreeMap<String, ToolOutput>) -> Self {
        self.prerequisite_outputs = outputs;
        self
    }

    /// Attach the cancellation token of the invocation.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt.max(1);
        self
    }

    pub fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    pub fn tool_id(&self) -> &str {
        &self.tool_id
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Output of one prerequisite, if it ran and succeeded.
    pub fn prerequisite_output(&self, tool_id: &str) -> Option<&ToolOutput> {
        self.prerequisite_outputs.get(tool_id)
    }

    pub fn prerequisite_outputs(&self) -> &BTreeMap<String, ToolOutput> {
        &self.prerequisite_outputs
    }

    /// Token cancelled when the invocation times out or the request is aborted.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

impl ExecutionContext for ToolContext {
    fn request_id(&self) -> &str {
        &self.request_id
    }

    fn snapshot(&self) -> &str {
        &self.snapshot
    }

    fn categories(&self) -> &CategorySelection {
        &self.categories
    }

    fn languages(&self) -> &[String] {
        &self.languages
    }
}

impl ExecutionContext for AnalysisRequest {
    fn request_id(&self) -> &str {
        &self.id
    }

    fn snapshot(&self) -> &str {
        &self.snapshot
    }

    fn categories(&self) -> &CategorySelection {
        &self.categories
    }

    fn languages(&self) -> &[String] {
        &self.languages
    }
}
