//! Priority-Based Strategy
//!
//! Whenever a slot is free, dispatch the highest-scored tool whose
//! prerequisites have all succeeded. Dispatching consumes the tool's
//! estimated cost from a cumulative budget; a tool costing more than what is
//! left is deferred. When nothing is in flight and nothing can be
//! dispatched, the deferred tools are skipped.

use std::collections::{BTreeSet, HashMap};

use tokio::task::{self, JoinSet};

use review_cascade_core::ToolInvocation;

use super::coordinator::Run;
use super::invoke::invoke;

/// Tolerance for floating-point budget comparisons.
const BUDGET_EPSILON: f64 = 1e-9;

pub(super) async fn run(run: &mut Run<'_>, budget: Option<f64>) {
    let plan = run.plan;
    let max_in_flight = run.max_concurrency();
    let mut pending: Vec<String> = plan.priority_order();
    let mut remaining = budget;
    let mut deferred: BTreeSet<String> = BTreeSet::new();
    let mut in_flight: JoinSet<ToolInvocation> = JoinSet::new();
    let mut task_tools: HashMap<task::Id, String> = HashMap::new();

    if let Some(budget) = budget {
        tracing::debug!(
            request_id = %run.request.id,
            budget,
            planned_cost = plan.total_cost(),
            "priority execution with resource budget"
        );
    }

    loop {
        if run.halt_reason().is_some() {
            for tool_id in std::mem::take(&mut pending) {
                run.halt(&tool_id).await;
            }
        }

        // Tools whose prerequisites ended without success can never run.
        let mut index = 0;
        while index < pending.len() {
            match run.failed_prerequisite(&pending[index]) {
                Some(reason) => {
                    let tool_id = pending.remove(index);
                    run.skip(&tool_id, reason).await;
                }
                None => index += 1,
            }
        }

        let mut index = 0;
        while in_flight.len() < max_in_flight && index < pending.len() {
            let tool_id = &pending[index];
            if !run.prerequisites_succeeded(tool_id) {
                index += 1;
                continue;
            }
            let cost = plan
                .descriptor(tool_id)
                .map(|d| d.estimated_cost)
                .unwrap_or(0.0);
            if let Some(left) = remaining {
                if cost > left + BUDGET_EPSILON {
                    if deferred.insert(tool_id.clone()) {
                        tracing::debug!(
                            request_id = %run.request.id,
                            tool_id = %tool_id,
                            cost,
                            remaining = left,
                            "deferring tool over budget"
                        );
                    }
                    index += 1;
                    continue;
                }
                remaining = Some(left - cost);
            }

            let tool_id = pending.remove(index);
            deferred.remove(&tool_id);
            match run.prepare(&tool_id) {
                Ok(spec) => {
                    let abort = run.abort.clone();
                    let progress = run.progress.clone();
                    let handle = in_flight.spawn(invoke(spec, abort, progress));
                    task_tools.insert(handle.id(), tool_id);
                }
                Err(invocation) => run.finish(invocation).await,
            }
        }

        if in_flight.is_empty() {
            // Nothing running and nothing dispatchable.
            for tool_id in std::mem::take(&mut pending) {
                let reason = if deferred.contains(&tool_id) {
                    format!(
                        "resource budget exhausted ({:.1} left)",
                        remaining.unwrap_or(0.0)
                    )
                } else {
                    "prerequisites did not run".to_string()
                };
                run.skip(&tool_id, reason).await;
            }
            break;
        }

        match in_flight.join_next_with_id().await {
            Some(Ok((id, invocation))) => {
                task_tools.remove(&id);
                run.finish(invocation).await;
            }
            Some(Err(err)) => match task_tools.remove(&err.id()) {
                Some(tool_id) => run.lost(&tool_id, &err).await,
                None => tracing::error!(
                    request_id = %run.request.id,
                    error = %err,
                    "untracked tool task ended"
                ),
            },
            None => {}
        }
    }
}
