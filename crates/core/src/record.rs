//! Execution Records and Scoring Profiles
//!
//! An `ExecutionRecord` is the durable, append-only summary of one invocation.
//! A `ScoringProfile` is the running per-tool aggregate the scorer reads; it is
//! overwritten on every dispatched record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::invocation::{InvocationState, ToolInvocation};

/// Outcome summary of one tool invocation. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub tool_id: String,
    pub request_id: String,
    /// Category of the tool that ran
    pub category: String,
    /// Number of files in the analyzed snapshot
    pub context_size: u64,
    /// Number of requested categories, 0 for "all"
    pub category_count: usize,
    pub duration_ms: u64,
    pub finding_count: usize,
    pub state: InvocationState,
    /// Mean confidence of the normalized findings, if any
    #[serde(default)]
    pub mean_confidence: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl ExecutionRecord {
    /// Summarize an invocation. `confidences` are the confidences of the
    /// invocation's normalized findings.
    pub fn from_invocation(
        invocation: &ToolInvocation,
        category: impl Into<String>,
        context_size: u64,
        category_count: usize,
        confidences: &[f64],
    ) -> Self {
        let mean_confidence = if confidences.is_empty() {
            None
        } else {
            Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
        };
        Self {
            tool_id: invocation.tool_id.clone(),
            request_id: invocation.request_id.clone(),
            category: category.into(),
            context_size,
            category_count,
            duration_ms: invocation.duration_ms(),
            finding_count: invocation.finding_count(),
            state: invocation.state,
            mean_confidence,
            error: invocation.error.clone(),
            recorded_at: invocation.finished_at,
        }
    }
}

/// Running per-tool statistics consumed by the scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringProfile {
    pub tool_id: String,
    /// Dispatched executions seen
    pub executions: u64,
    pub successes: u64,
    /// successes / executions; 0.5 with no history
    pub success_rate: f64,
    /// EMA of wall-clock latency
    pub mean_latency_ms: f64,
    /// EMA of findings per successful execution
    pub mean_findings: f64,
    /// EMA of mean finding confidence per successful execution
    pub mean_confidence: f64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ScoringProfile {
    /// The profile of a tool with no history.
    pub fn neutral(tool_id: impl Into<String>) -> Self {
        Self {
            tool_id: tool_id.into(),
            executions: 0,
            successes: 0,
            success_rate: 0.5,
            mean_latency_ms: 0.0,
            mean_findings: 0.0,
            mean_confidence: 0.0,
            updated_at: None,
        }
    }

    pub fn has_history(&self) -> bool {
        self.executions > 0
    }

    /// Fold one record into the profile with smoothing factor `alpha`.
    ///
    /// Records for tools that never ran leave the profile untouched. The first
    /// sample of each average initializes it instead of being smoothed toward
    /// zero. Returns whether the profile changed.
    pub fn apply(&mut self, record: &ExecutionRecord, alpha: f64) -> bool {
        if !record.state.was_dispatched() {
            return false;
        }
        let alpha = alpha.clamp(0.0, 1.0);
        let ema = |current: f64, sample: f64, first: bool| {
            if first {
                sample
            } else {
                alpha * sample + (1.0 - alpha) * current
            }
        };

        self.executions += 1;
        self.mean_latency_ms = ema(
            self.mean_latency_ms,
            record.duration_ms as f64,
            self.executions == 1,
        );

        if record.state.is_success() {
            self.successes += 1;
            let first = self.successes == 1;
            self.mean_findings = ema(self.mean_findings, record.finding_count as f64, first);
            if let Some(confidence) = record.mean_confidence {
                let first = first || self.mean_confidence == 0.0;
                self.mean_confidence = ema(self.mean_confidence, confidence, first);
            }
        }

        self.success_rate = self.successes as f64 / self.executions as f64;
        self.updated_at = Some(record.recorded_at);
        true
    }
}
