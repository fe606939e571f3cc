//! Strategy Selection
//!
//! Resolves the strategy a request runs with. Explicit requests are honored;
//! `adaptive` is decided deterministically from the plan and request size.

use serde::{Deserialize, Serialize};

use review_cascade_core::{AnalysisRequest, ExecutionStrategy};

use crate::config::AdaptiveConfig;
use crate::services::planning::ExecutionPlan;

/// The strategy a request runs with and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyDecision {
    pub strategy: ExecutionStrategy,
    pub requested: ExecutionStrategy,
    pub reasoning: String,
}

pub fn select_strategy(
    request: &AnalysisRequest,
    plan: &ExecutionPlan,
    max_concurrency: usize,
    adaptive: &AdaptiveConfig,
) -> StrategyDecision {
    let requested = request.requested_strategy();
    if requested != ExecutionStrategy::Adaptive {
        return StrategyDecision {
            strategy: requested,
            requested,
            reasoning: format!("{} requested explicitly", requested),
        };
    }

    let tools = plan.tool_count();
    let overload_limit = max_concurrency as f64 * adaptive.overload_factor;
    let (strategy, reasoning) = if tools as f64 > overload_limit {
        (
            ExecutionStrategy::PriorityBased,
            format!(
                "{} tools exceed {} concurrent slots by more than {}x",
                tools, max_concurrency, adaptive.overload_factor
            ),
        )
    } else if request.size.file_count <= adaptive.small_request_max_files
        && request.categories.count() == Some(1)
    {
        (
            ExecutionStrategy::Sequential,
            format!(
                "small single-category request ({} files)",
                request.size.file_count
            ),
        )
    } else {
        (
            ExecutionStrategy::Parallel,
            format!(
                "{} tools in {} stage(s) fit {} concurrent slots",
                tools,
                plan.stage_count(),
                max_concurrency
            ),
        )
    };

    tracing::debug!(
        request_id = %request.id,
        %strategy,
        %reasoning,
        "adaptive strategy selected"
    );

    StrategyDecision {
        strategy,
        requested,
        reasoning,
    }
}
