//! Sequential Strategy
//!
//! Stages in order, one tool at a time in stage order. A tool that fails or
//! times out aborts the rest of the plan unless its category is configured
//! as non-essential. Each invocation runs on its own task so a panic
//! surfaces as that tool's failure.

use review_cascade_core::InvocationState;

use super::coordinator::Run;
use super::invoke::invoke;

pub(super) async fn run(run: &mut Run<'_>) {
    let plan = run.plan;
    let mut aborted_by: Option<String> = None;

    for stage in &plan.stages {
        if run.halt_reason().is_none() && aborted_by.is_none() {
            run.stage_started(stage);
        }

        for tool_id in &stage.tool_ids {
            if run.halt_reason().is_some() {
                run.halt(tool_id).await;
                continue;
            }
            if let Some(failed) = &aborted_by {
                let reason = format!("aborted after '{}' failed", failed);
                run.skip(tool_id, reason).await;
                continue;
            }
            if let Some(reason) = run.failed_prerequisite(tool_id) {
                run.skip(tool_id, reason).await;
                continue;
            }

            let task = match run.prepare(tool_id) {
                Ok(spec) => {
                    tokio::spawn(invoke(spec, run.abort.clone(), run.progress.clone())).await
                }
                Err(invocation) => Ok(invocation),
            };
            match task {
                Ok(invocation) => run.finish(invocation).await,
                Err(err) => run.lost(tool_id, &err).await,
            }
            let state = run.state_of(tool_id).unwrap_or(InvocationState::Failed);

            if state.was_dispatched() && !state.is_success() && run.halt_reason().is_none() {
                let category = plan
                    .descriptor(tool_id)
                    .map(|d| d.category.as_str())
                    .unwrap_or_default();
                if run.config().is_non_essential_category(category) {
                    tracing::debug!(
                        request_id = %run.request.id,
                        tool_id = %tool_id,
                        category,
                        "non-essential category failed, continuing"
                    );
                } else {
                    tracing::warn!(
                        request_id = %run.request.id,
                        tool_id = %tool_id,
                        "aborting remaining sequential plan"
                    );
                    aborted_by = Some(tool_id.clone());
                }
            }
        }
    }
}
