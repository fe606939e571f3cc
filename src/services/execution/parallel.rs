//! Parallel Strategy
//!
//! Stages in order; within a stage every ready tool is spawned at once and a
//! semaphore bounds how many run concurrently. The next stage starts only
//! after every invocation of the current one has finished.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};

use review_cascade_core::ToolInvocation;

use super::coordinator::Run;
use super::invoke::invoke;

pub(super) async fn run(run: &mut Run<'_>) {
    let plan = run.plan;
    let semaphore = Arc::new(Semaphore::new(run.max_concurrency()));

    for stage in &plan.stages {
        if run.halt_reason().is_some() {
            for tool_id in &stage.tool_ids {
                run.halt(tool_id).await;
            }
            continue;
        }
        run.stage_started(stage);

        // Err carries the id of a tool stopped before it got a slot.
        let mut tasks: JoinSet<Result<ToolInvocation, String>> = JoinSet::new();
        let mut task_tools: HashMap<task::Id, String> = HashMap::new();
        for tool_id in &stage.tool_ids {
            if let Some(reason) = run.failed_prerequisite(tool_id) {
                run.skip(tool_id, reason).await;
                continue;
            }
            let spec = match run.prepare(tool_id) {
                Ok(spec) => spec,
                Err(invocation) => {
                    run.finish(invocation).await;
                    continue;
                }
            };

            let semaphore = semaphore.clone();
            let abort = run.abort.clone();
            let progress = run.progress.clone();
            let handle = tasks.spawn(async move {
                let permit = tokio::select! {
                    permit = semaphore.acquire_owned() => permit.ok(),
                    _ = abort.cancelled() => None,
                };
                match permit {
                    Some(_permit) => Ok(invoke(spec, abort, progress).await),
                    None => Err(spec.context.tool_id().to_string()),
                }
            });
            task_tools.insert(handle.id(), tool_id.clone());
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(invocation)) => run.finish(invocation).await,
                Ok(Err(tool_id)) => run.halt(&tool_id).await,
                Err(err) => match task_tools.get(&err.id()) {
                    Some(tool_id) => run.lost(tool_id, &err).await,
                    None => tracing::error!(
                        request_id = %run.request.id,
                        error = %err,
                        "untracked tool task ended"
                    ),
                },
            }
        }
    }
}
