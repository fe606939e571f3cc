//! Execution Plan
//!
//! Stages of tools where every tool's prerequisites sit in earlier stages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use review_cascade_core::ToolDescriptor;

/// A group of tools that may run concurrently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    /// 0-based position in the plan
    pub index: usize,
    /// Tool ids, highest score first
    pub tool_ids: Vec<String>,
}

impl Stage {
    pub fn new(index: usize, tool_ids: Vec<String>) -> Self {
        Self { index, tool_ids }
    }

    pub fn is_empty(&self) -> bool {
        self.tool_ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tool_ids.len()
    }
}

/// One tool in the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedTool {
    pub descriptor: ToolDescriptor,
    pub score: f64,
    pub stage: usize,
    /// Included only as a prerequisite of a selected tool
    pub forced: bool,
}

/// A selected tool left out of the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedTool {
    pub tool_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    pub request_id: String,
    pub stages: Vec<Stage>,
    pub tools: BTreeMap<String, PlannedTool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dropped: Vec<DroppedTool>,
}

impl ExecutionPlan {
    pub fn empty(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            stages: Vec::new(),
            tools: BTreeMap::new(),
            dropped: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn tool(&self, tool_id: &str) -> Option<&PlannedTool> {
        self.tools.get(tool_id)
    }

    pub fn descriptor(&self, tool_id: &str) -> Option<&ToolDescriptor> {
        self.tools.get(tool_id).map(|t| &t.descriptor)
    }

    /// Stage index of a planned tool.
    pub fn stage_of(&self, tool_id: &str) -> Option<usize> {
        self.tools.get(tool_id).map(|t| t.stage)
    }

    pub fn score_of(&self, tool_id: &str) -> f64 {
        self.tools.get(tool_id).map(|t| t.score).unwrap_or(0.0)
    }

    /// Sum of estimated costs of every planned tool.
    pub fn total_cost(&self) -> f64 {
        self.tools.values().map(|t| t.descriptor.estimated_cost).sum()
    }

    /// Tool ids in stage order.
    pub fn ordered_ids(&self) -> Vec<String> {
        self.stages
            .iter()
            .flat_map(|s| s.tool_ids.iter().cloned())
            .collect()
    }

    /// Tool ids by descending score, ties by ascending id, ignoring stages.
    pub fn priority_order(&self) -> Vec<String> {
        let mut ids: Vec<&PlannedTool> = self.tools.values().collect();
        ids.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.descriptor.id.cmp(&b.descriptor.id))
        });
        ids.into_iter().map(|t| t.descriptor.id.clone()).collect()
    }

    /// Largest number of tools in any stage.
    pub fn max_stage_width(&self) -> usize {
        self.stages.iter().map(Stage::len).max().unwrap_or(0)
    }
}
