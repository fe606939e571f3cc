//! Tool Invocations
//!
//! A `ToolInvocation` is one attempt to run one tool for one request. It ends
//! in exactly one terminal `InvocationState` and carries either the tool's
//! output or the error detail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::finding::RawFinding;

/// Terminal state of a tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
    Succeeded,
    Failed,
    TimedOut,
    /// Never dispatched: aborted plan, failed prerequisite or exhausted budget
    Skipped,
    /// Interrupted by request-level cancellation
    Cancelled,
}

impl InvocationState {
    /// Whether the tool actually ran (and so says something about the tool).
    pub fn was_dispatched(&self) -> bool {
        matches!(
            self,
            InvocationState::Succeeded | InvocationState::Failed | InvocationState::TimedOut
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, InvocationState::Succeeded)
    }
}

impl std::fmt::Display for InvocationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvocationState::Succeeded => write!(f, "succeeded"),
            InvocationState::Failed => write!(f, "failed"),
            InvocationState::TimedOut => write!(f, "timed_out"),
            InvocationState::Skipped => write!(f, "skipped"),
            InvocationState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// What a tool returns on success.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutput {
    /// Raw findings in the tool's own terms
    #[serde(default)]
    pub findings: Vec<RawFinding>,
    /// Free-text summary, handed to dependents as context
    #[serde(default)]
    pub summary: String,
    /// Structured side data (metrics, dependency graphs) for dependents
    #[serde(default)]
    pub data: Value,
}

impl ToolOutput {
    pub fn with_findings(findings: Vec<RawFinding>) -> Self {
        Self {
            findings,
            ..Default::default()
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

/// One attempt to run one tool for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub id: String,
    pub request_id: String,
    pub tool_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub state: InvocationState,
    #[serde(default)]
    pub output: Option<ToolOutput>,
    #[serde(default)]
    pub error: Option<String>,
    /// Number of dispatch attempts, 0 for never-dispatched invocations
    pub attempts: u32,
}

impl ToolInvocation {
    /// An invocation that was never dispatched.
    pub fn skipped(
        id: impl Into<String>,
        request_id: impl Into<String>,
        tool_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::not_run(id, request_id, tool_id, InvocationState::Skipped, reason)
    }

    /// An invocation that never started because the request was cancelled.
    pub fn cancelled(
        id: impl Into<String>,
        request_id: impl Into<String>,
        tool_id: impl Into<String>,
    ) -> Self {
        Self::not_run(
            id,
            request_id,
            tool_id,
            InvocationState::Cancelled,
            "request cancelled",
        )
    }

    fn not_run(
        id: impl Into<String>,
        request_id: impl Into<String>,
        tool_id: impl Into<String>,
        state: InvocationState,
        reason: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            request_id: request_id.into(),
            tool_id: tool_id.into(),
            started_at: now,
            finished_at: now,
            state,
            output: None,
            error: Some(reason.into()),
            attempts: 0,
        }
    }

    /// Wall-clock duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }

    pub fn finding_count(&self) -> usize {
        self.output.as_ref().map(|o| o.findings.len()).unwrap_or(0)
    }
}
