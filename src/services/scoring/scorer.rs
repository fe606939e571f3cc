//! Capability Scorer
//!
//! Scores every candidate tool for a request as a weighted sum of:
//! - base priority (descriptor)
//! - historical success rate (learning store; 0.5 without history)
//! - category relevance (exact 1.0, partial 0.5, none 0.0)
//! - inverse cost `1 - cost / max_cost`, only for constrained requests
//! - preference, for tools the request prefers
//!
//! Excluded tools and tools incompatible with the request's languages are
//! not scored. Scoring is pure: the same inputs always give the same order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use review_cascade_core::{AnalysisRequest, CategoryMatch, ToolDescriptor};

use crate::config::ScoringWeights;
use crate::services::learning::ProfileSource;

/// Unweighted term values behind a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub base_priority: f64,
    pub historical_success: f64,
    pub relevance: CategoryMatch,
    /// `None` when the request is not resource constrained
    pub inverse_cost: Option<f64>,
    pub preferred: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredTool {
    pub tool_id: String,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

pub struct CapabilityScorer {
    weights: ScoringWeights,
}

impl CapabilityScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Whether the request allows `descriptor` to be scored at all.
    pub fn is_candidate(request: &AnalysisRequest, descriptor: &ToolDescriptor) -> bool {
        !request.excluded_tools.contains(&descriptor.id)
            && descriptor.supports_languages(&request.languages)
    }

    /// Score all candidate tools, highest first, ties by ascending id.
    pub fn score(
        &self,
        request: &AnalysisRequest,
        descriptors: &BTreeMap<String, ToolDescriptor>,
        profiles: &dyn ProfileSource,
    ) -> Vec<ScoredTool> {
        let candidates: Vec<&ToolDescriptor> = descriptors
            .values()
            .filter(|d| {
                let candidate = Self::is_candidate(request, d);
                if !candidate {
                    tracing::debug!(
                        request_id = %request.id,
                        tool_id = %d.id,
                        "tool excluded from scoring"
                    );
                }
                candidate
            })
            .collect();

        let max_cost = candidates
            .iter()
            .map(|d| d.estimated_cost)
            .fold(0.0_f64, f64::max);

        let mut scored: Vec<ScoredTool> = candidates
            .into_iter()
            .map(|d| {
                let profile = profiles.profile(&d.id);
                self.score_tool(request, d, profile.success_rate, max_cost)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.tool_id.cmp(&b.tool_id))
        });
        scored
    }

    /// Score one tool given its historical success rate and the highest cost
    /// among the candidates.
    pub fn score_tool(
        &self,
        request: &AnalysisRequest,
        descriptor: &ToolDescriptor,
        success_rate: f64,
        max_cost: f64,
    ) -> ScoredTool {
        let relevance = request.categories.relevance(&descriptor.category);
        let inverse_cost = request.constrained_resources.then(|| {
            if max_cost > 0.0 {
                (1.0 - descriptor.estimated_cost / max_cost).clamp(0.0, 1.0)
            } else {
                1.0
            }
        });
        let preferred = request.preferred_tools.contains(&descriptor.id);

        let w = &self.weights;
        let mut score = w.base_priority * descriptor.base_priority
            + w.historical_success * success_rate
            + w.relevance * relevance.relevance();
        if let Some(inverse_cost) = inverse_cost {
            score += w.cost * inverse_cost;
        }
        if preferred {
            score += w.preference;
        }

        ScoredTool {
            tool_id: descriptor.id.clone(),
            score,
            breakdown: ScoreBreakdown {
                base_priority: descriptor.base_priority,
                historical_success: success_rate,
                relevance,
                inverse_cost,
                preferred,
            },
        }
    }
}
