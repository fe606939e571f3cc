//! Learning Insights
//!
//! Effectiveness ranking of tools and request-level averages derived from
//! the learning store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use review_cascade_core::ScoringProfile;

use super::store::RequestOutcome;

/// Tools with fewer dispatched executions are not judged as underperforming.
const MIN_EXECUTIONS_FOR_VERDICT: u64 = 5;

/// Below this success rate a tool counts as underperforming.
const UNDERPERFORMING_SUCCESS_RATE: f64 = 0.5;

/// A tool combination needs this many requests to be ranked.
const MIN_COMBINATION_SAMPLES: usize = 3;

const MAX_COMBINATIONS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInsight {
    pub tool_id: String,
    pub executions: u64,
    pub success_rate: f64,
    pub mean_latency_ms: f64,
    pub mean_findings: f64,
    pub mean_confidence: f64,
    /// Expected finding confidence per dispatch (failures count as zero)
    pub effectiveness: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinationInsight {
    pub tools: Vec<String>,
    pub requests: usize,
    pub mean_finding_quality: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningInsights {
    pub tools_tracked: usize,
    pub total_executions: u64,
    /// Most effective first
    pub ranking: Vec<ToolInsight>,
    pub underperforming: Vec<String>,
    pub best_combinations: Vec<CombinationInsight>,
    pub requests: usize,
    pub mean_execution_time_ms: Option<f64>,
    pub mean_tool_success_rate: Option<f64>,
    pub mean_category_coverage: Option<f64>,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

impl LearningInsights {
    pub fn build(profiles: &BTreeMap<String, ScoringProfile>, requests: &[RequestOutcome]) -> Self {
        let mut ranking: Vec<ToolInsight> = profiles
            .values()
            .filter(|p| p.has_history())
            .map(|p| ToolInsight {
                tool_id: p.tool_id.clone(),
                executions: p.executions,
                success_rate: p.success_rate,
                mean_latency_ms: p.mean_latency_ms,
                mean_findings: p.mean_findings,
                mean_confidence: p.mean_confidence,
                effectiveness: p.success_rate * p.mean_confidence,
            })
            .collect();
        ranking.sort_by(|a, b| {
            b.effectiveness
                .total_cmp(&a.effectiveness)
                .then_with(|| a.tool_id.cmp(&b.tool_id))
        });

        let underperforming = ranking
            .iter()
            .filter(|t| {
                t.executions >= MIN_EXECUTIONS_FOR_VERDICT
                    && t.success_rate < UNDERPERFORMING_SUCCESS_RATE
            })
            .map(|t| t.tool_id.clone())
            .collect();

        let mut by_combination: BTreeMap<&[String], Vec<f64>> = BTreeMap::new();
        for outcome in requests.iter().filter(|o| o.tools.len() > 1) {
            by_combination
                .entry(outcome.tools.as_slice())
                .or_default()
                .push(outcome.finding_quality);
        }
        let mut best_combinations: Vec<CombinationInsight> = by_combination
            .into_iter()
            .filter(|(_, scores)| scores.len() >= MIN_COMBINATION_SAMPLES)
            .map(|(tools, scores)| CombinationInsight {
                tools: tools.to_vec(),
                requests: scores.len(),
                mean_finding_quality: mean(scores.iter().copied()).unwrap_or(0.0),
            })
            .collect();
        best_combinations.sort_by(|a, b| {
            b.mean_finding_quality
                .total_cmp(&a.mean_finding_quality)
                .then_with(|| a.tools.cmp(&b.tools))
        });
        best_combinations.truncate(MAX_COMBINATIONS);

        Self {
            tools_tracked: ranking.len(),
            total_executions: ranking.iter().map(|t| t.executions).sum(),
            ranking,
            underperforming,
            best_combinations,
            requests: requests.len(),
            mean_execution_time_ms: mean(requests.iter().map(|o| o.execution_time_ms as f64)),
            mean_tool_success_rate: mean(requests.iter().map(|o| o.tool_success_rate)),
            mean_category_coverage: mean(requests.iter().map(|o| o.category_coverage)),
        }
    }
}
