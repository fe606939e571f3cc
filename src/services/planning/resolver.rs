//! Dependency Resolver
//!
//! Turns scored tools into a staged execution plan:
//! 1. keep tools scoring above the inclusion threshold, capped at the
//!    configured maximum
//! 2. force-include every transitive prerequisite of the kept tools
//! 3. layer the result topologically; within a stage order by score
//!
//! Planning fails with `CoreError::DependencyCycle` before any tool runs when
//! the prerequisite graph is cyclic.

use std::collections::{BTreeMap, BTreeSet};

use review_cascade_core::{
    layer_graph, transitive_closure, AnalysisRequest, CoreResult, ToolDescriptor,
};

use crate::config::PlanningConfig;
use crate::services::scoring::ScoredTool;

use super::plan::{DroppedTool, ExecutionPlan, PlannedTool, Stage};

pub struct DependencyResolver {
    config: PlanningConfig,
}

impl DependencyResolver {
    pub fn new(config: PlanningConfig) -> Self {
        Self { config }
    }

    pub fn resolve(
        &self,
        request: &AnalysisRequest,
        descriptors: &BTreeMap<String, ToolDescriptor>,
        scored: &[ScoredTool],
    ) -> CoreResult<ExecutionPlan> {
        let graph: BTreeMap<String, BTreeSet<String>> = descriptors
            .iter()
            .map(|(id, d)| (id.clone(), d.prerequisites.clone()))
            .collect();

        // Any cycle in the descriptor set invalidates planning.
        layer_graph(&graph)?;

        let scores: BTreeMap<&str, f64> = scored
            .iter()
            .map(|s| (s.tool_id.as_str(), s.score))
            .collect();

        let mut selected: Vec<&ScoredTool> = scored
            .iter()
            .filter(|s| s.score > self.config.inclusion_threshold)
            .collect();
        if let Some(max) = self.config.max_selected_tools {
            if selected.len() > max {
                tracing::debug!(
                    request_id = %request.id,
                    selected = selected.len(),
                    max,
                    "capping selected tools"
                );
                selected.truncate(max);
            }
        }

        let mut chosen: BTreeSet<String> = BTreeSet::new();
        let mut included: BTreeSet<String> = BTreeSet::new();
        let mut dropped = Vec::new();
        for tool in selected {
            let (closure, missing) = transitive_closure(&graph, std::iter::once(&tool.tool_id));
            let excluded: Vec<&String> = closure
                .iter()
                .filter(|id| request.excluded_tools.contains(*id))
                .collect();

            let reason = if !missing.is_empty() {
                Some(format!(
                    "missing prerequisite(s): {}",
                    missing.iter().cloned().collect::<Vec<_>>().join(", ")
                ))
            } else if !excluded.is_empty() {
                Some(format!(
                    "excluded prerequisite(s): {}",
                    excluded.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
                ))
            } else {
                None
            };

            match reason {
                Some(reason) => {
                    tracing::warn!(
                        request_id = %request.id,
                        tool_id = %tool.tool_id,
                        %reason,
                        "dropping selected tool"
                    );
                    dropped.push(DroppedTool {
                        tool_id: tool.tool_id.clone(),
                        reason,
                    });
                }
                None => {
                    chosen.insert(tool.tool_id.clone());
                    included.extend(closure);
                }
            }
        }

        let subgraph: BTreeMap<String, BTreeSet<String>> = included
            .iter()
            .filter_map(|id| graph.get(id).map(|p| (id.clone(), p.clone())))
            .collect();
        let layers = layer_graph(&subgraph)?;

        let mut tools = BTreeMap::new();
        let mut stages = Vec::with_capacity(layers.len());
        for (index, mut layer) in layers.into_iter().enumerate() {
            layer.sort_by(|a, b| {
                let sa = scores.get(a.as_str()).copied().unwrap_or(0.0);
                let sb = scores.get(b.as_str()).copied().unwrap_or(0.0);
                sb.total_cmp(&sa).then_with(|| a.cmp(b))
            });
            for id in &layer {
                if let Some(descriptor) = descriptors.get(id) {
                    let score = scores.get(id.as_str()).copied().unwrap_or(0.0);
                    let forced = !chosen.contains(id);
                    tools.insert(
                        id.clone(),
                        PlannedTool {
                            descriptor: descriptor.clone(),
                            score,
                            stage: index,
                            forced,
                        },
                    );
                }
            }
            stages.push(Stage::new(index, layer));
        }

        let plan = ExecutionPlan {
            request_id: request.id.clone(),
            stages,
            tools,
            dropped,
        };

        tracing::info!(
            request_id = %request.id,
            tools = plan.tool_count(),
            stages = plan.stage_count(),
            total_cost = plan.total_cost(),
            "execution plan resolved"
        );
        Ok(plan)
    }
}
