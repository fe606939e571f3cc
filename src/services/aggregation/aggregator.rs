//! Result Aggregator
//!
//! Turns the raw output of succeeded invocations into the unified finding
//! set: normalize, deduplicate, correlate, then sort into report order.
//! The result depends only on the set of findings, never on the order in
//! which tools completed.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use review_cascade_core::{Finding, ToolInvocation};

use crate::config::AggregationConfig;

use super::correlation::{correlate, RelationTable};
use super::dedup::{deduplicate, AggregationConflict};

/// Unified findings of one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedFindings {
    pub findings: Vec<Finding>,
    pub conflicts: Vec<AggregationConflict>,
}

impl AggregatedFindings {
    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// Mean confidence, or 0 with no findings.
    pub fn mean_confidence(&self) -> f64 {
        if self.findings.is_empty() {
            return 0.0;
        }
        self.findings.iter().map(|f| f.confidence).sum::<f64>() / self.findings.len() as f64
    }
}

/// Per-request finding buffer shared by concurrent completions.
#[derive(Debug, Clone, Default)]
pub struct AggregationBuffer {
    findings: Arc<Mutex<Vec<Finding>>>,
}

impl AggregationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize and buffer the findings of a succeeded invocation; other
    /// states contribute nothing. Returns the number buffered.
    pub fn add_invocation(&self, invocation: &ToolInvocation, baseline: f64) -> usize {
        if !invocation.state.is_success() {
            return 0;
        }
        let Some(output) = invocation.output.as_ref() else {
            return 0;
        };
        let normalized: Vec<Finding> = output
            .findings
            .iter()
            .cloned()
            .map(|raw| Finding::from_raw(raw, &invocation.tool_id, baseline))
            .collect();
        let count = normalized.len();
        self.lock().extend(normalized);
        count
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Take everything buffered so far.
    pub fn drain(&self) -> Vec<Finding> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Finding>> {
        self.findings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct ResultAggregator {
    config: AggregationConfig,
    relations: RelationTable,
}

impl ResultAggregator {
    pub fn new(config: AggregationConfig) -> Self {
        let relations = RelationTable::builtin().with_pairs(&config.related_categories);
        Self { config, relations }
    }

    pub fn relations(&self) -> &RelationTable {
        &self.relations
    }

    pub fn aggregate(&self, findings: Vec<Finding>) -> AggregatedFindings {
        let raw = findings.len();
        let (mut findings, conflicts) = deduplicate(
            findings,
            self.config.corroboration_bonus,
            self.config.max_corroboration_bonus,
        );
        let correlated = correlate(&mut findings, &self.relations);
        findings.sort_by(|a, b| a.report_order(b));

        tracing::info!(
            raw,
            unique = findings.len(),
            conflicts = conflicts.len(),
            correlated,
            "aggregated findings"
        );

        AggregatedFindings {
            findings,
            conflicts,
        }
    }

    /// Aggregate whatever `buffer` holds.
    pub fn aggregate_buffer(&self, buffer: &AggregationBuffer) -> AggregatedFindings {
        self.aggregate(buffer.drain())
    }
}
