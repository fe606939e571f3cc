//! Progress Events
//!
//! Optional channel that observes a request while it runs. Emitting never
//! blocks and a dropped receiver is ignored.

use serde::Serialize;
use tokio::sync::mpsc;

use review_cascade_core::{ExecutionStrategy, InvocationState};

use super::orchestrator::ReportStatus;

/// Events emitted while a request is served
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Plan resolved and strategy chosen
    Planned {
        request_id: String,
        strategy: ExecutionStrategy,
        stages: usize,
        tools: usize,
        reasoning: String,
    },
    /// A stage started (sequential and parallel strategies)
    StageStarted {
        request_id: String,
        stage: usize,
        tool_ids: Vec<String>,
    },
    /// A tool was dispatched
    ToolStarted { request_id: String, tool_id: String },
    /// A transient error is retried after a delay
    ToolRetrying {
        request_id: String,
        tool_id: String,
        attempt: u32,
        delay_ms: u64,
        error: String,
    },
    /// A tool reached a terminal state
    ToolFinished {
        request_id: String,
        tool_id: String,
        state: InvocationState,
        duration_ms: u64,
        findings: usize,
    },
    /// The request resolved
    Completed {
        request_id: String,
        status: ReportStatus,
        findings: usize,
    },
}

/// Sending half of a progress channel; the default reporter discards events.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl ProgressReporter {
    /// A reporter and the receiver of its events.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
