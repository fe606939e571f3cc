//! Core Error Types
//!
//! Defines the orchestration error taxonomy shared across the Review Cascade
//! workspace. Registration and planning errors (`DuplicateTool`,
//! `UnknownTool`, `DependencyCycle`) are fatal; execution errors
//! (`ToolExecution`, `Timeout`) are recoverable at the plan level and are
//! normally captured in an invocation rather than propagated;
//! `AggregationConflict` is informational.
//!
//! The root crate extends these with configuration-file variants.

use thiserror::Error;

/// Core error type for the Review Cascade workspace.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A tool with the same identity is already registered
    #[error("Duplicate tool: {0}")]
    DuplicateTool(String),

    /// A tool identity does not resolve to a registered tool
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The prerequisite graph contains a cycle among the listed tools
    #[error("Dependency cycle detected among tools: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    /// A tool raised an error within its own logic
    #[error("Tool '{tool_id}' failed: {message}")]
    ToolExecution { tool_id: String, message: String },

    /// A tool exceeded its configured timeout
    #[error("Tool '{tool_id}' timed out after {timeout_ms}ms")]
    Timeout { tool_id: String, timeout_ms: u64 },

    /// Two duplicate findings could not be reconciled
    #[error("Aggregation conflict on '{signature}': {detail}")]
    AggregationConflict { signature: String, detail: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a duplicate tool error
    pub fn duplicate_tool(id: impl Into<String>) -> Self {
        Self::DuplicateTool(id.into())
    }

    /// Create an unknown tool error
    pub fn unknown_tool(id: impl Into<String>) -> Self {
        Self::UnknownTool(id.into())
    }

    /// Create a dependency cycle error. Members are sorted for stable messages.
    pub fn dependency_cycle(mut members: Vec<String>) -> Self {
        members.sort();
        members.dedup();
        Self::DependencyCycle(members)
    }

    /// Create a tool execution error
    pub fn tool_execution(tool_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_id: tool_id.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(tool_id: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            tool_id: tool_id.into(),
            timeout_ms,
        }
    }

    /// Create an aggregation conflict error
    pub fn aggregation_conflict(signature: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::AggregationConflict {
            signature: signature.into(),
            detail: detail.into(),
        }
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error aborts a request outright.
    ///
    /// Execution-time errors are recoverable at the plan level; everything
    /// raised during registration or planning is not.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            CoreError::ToolExecution { .. }
                | CoreError::Timeout { .. }
                | CoreError::AggregationConflict { .. }
        )
    }
}

/// Error returned by a tool's own logic.
///
/// Transient kinds are retried by the coordinator with backoff; everything
/// else ends the invocation as `failed`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("{0}")]
    Failed(String),

    /// Upstream rate limiting; `retry_after_ms` is the provider's hint
    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after_ms: Option<u64>,
    },

    /// Temporarily unreachable backend
    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("cancelled")]
    Cancelled,
}

impl ToolError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    pub fn rate_limited(msg: impl Into<String>, retry_after_ms: Option<u64>) -> Self {
        Self::RateLimited {
            message: msg.into(),
            retry_after_ms,
        }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Whether a retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ToolError::RateLimited { .. } | ToolError::Unavailable(_))
    }

    /// Provider-supplied delay before retrying, if any.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ToolError::RateLimited { retry_after_ms, .. } => *retry_after_ms,
            _ => None,
        }
    }
}

/// Convert CoreError to a string
impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::duplicate_tool("static_analyzer");
        assert_eq!(err.to_string(), "Duplicate tool: static_analyzer");
    }

    #[test]
    fn test_cycle_members_sorted() {
        let err = CoreError::dependency_cycle(vec!["c".into(), "a".into(), "b".into(), "a".into()]);
        assert_eq!(
            err.to_string(),
            "Dependency cycle detected among tools: a, b, c"
        );
    }

    #[test]
    fn test_fatality() {
        assert!(CoreError::unknown_tool("x").is_fatal());
        assert!(CoreError::dependency_cycle(vec!["x".into()]).is_fatal());
        assert!(!CoreError::timeout("x", 100).is_fatal());
        assert!(!CoreError::tool_execution("x", "boom").is_fatal());
        assert!(!CoreError::aggregation_conflict("sig", "severity mismatch").is_fatal());
    }

    #[test]
    fn test_tool_error_transience() {
        assert!(ToolError::rate_limited("slow down", Some(500)).is_transient());
        assert!(ToolError::unavailable("503").is_transient());
        assert!(!ToolError::failed("parse error").is_transient());
        assert!(!ToolError::Cancelled.is_transient());
        assert_eq!(ToolError::rate_limited("x", Some(500)).retry_after_ms(), Some(500));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let core_err: CoreError = io_err.into();
        assert!(matches!(core_err, CoreError::Io(_)));
    }

    #[test]
    fn test_error_conversion() {
        let err = CoreError::validation("field is required");
        let msg: String = err.into();
        assert_eq!(msg, "Validation error: field is required");
    }
}
