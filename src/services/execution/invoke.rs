//! Single Tool Invocation
//!
//! Runs one tool under its timeout. Transient errors are retried with
//! exponential backoff for as long as the timeout leaves room. A timeout or
//! cancellation drops the tool's future and cancels its context token, so
//! siblings are never affected. Panics inside a tool become `failed`.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use review_cascade_core::{
    AnalysisTool, CoreError, ExecutionContext, InvocationState, ToolContext, ToolError,
    ToolExecutable, ToolInvocation, ToolOutput,
};

use crate::config::RetryPolicy;
use crate::services::progress::{ProgressEvent, ProgressReporter};

/// Stand-in deadline for timeouts too large to represent.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Everything needed to run one tool, detached from the coordinator.
pub struct InvocationSpec {
    pub tool: Arc<dyn AnalysisTool>,
    pub context: ToolContext,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Run the tool described by `spec` until it succeeds, fails permanently,
/// times out or `cancel` fires.
pub async fn invoke(
    spec: InvocationSpec,
    cancel: CancellationToken,
    progress: ProgressReporter,
) -> ToolInvocation {
    let tool_id = spec.context.tool_id().to_string();
    let request_id = spec.context.request_id().to_string();
    let started_at = Utc::now();
    let now = Instant::now();
    let deadline = now
        .checked_add(spec.timeout)
        .unwrap_or_else(|| now + FAR_FUTURE);
    let max_attempts = spec.retry.max_attempts.max(1);

    progress.emit(ProgressEvent::ToolStarted {
        request_id: request_id.clone(),
        tool_id: tool_id.clone(),
    });
    tracing::debug!(
        request_id = %request_id,
        tool_id = %tool_id,
        timeout_ms = spec.timeout.as_millis() as u64,
        "dispatching tool"
    );

    let mut attempt = 0;
    let (state, output, error): (InvocationState, Option<ToolOutput>, Option<String>) = loop {
        attempt += 1;
        let attempt_token = cancel.child_token();
        let ctx = spec
            .context
            .clone()
            .with_attempt(attempt)
            .with_cancellation(attempt_token.clone());

        let execution = AssertUnwindSafe(spec.tool.execute(&ctx)).catch_unwind();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            r = tokio::time::timeout_at(deadline, execution) => Some(r),
        };

        let err = match result {
            None => {
                attempt_token.cancel();
                break (InvocationState::Cancelled, None, Some("request cancelled".to_string()));
            }
            Some(Err(_elapsed)) => {
                attempt_token.cancel();
                let err = CoreError::timeout(&tool_id, spec.timeout.as_millis() as u64);
                break (InvocationState::TimedOut, None, Some(err.to_string()));
            }
            Some(Ok(Err(panic))) => {
                let err = CoreError::tool_execution(
                    &tool_id,
                    format!("panicked: {}", panic_message(panic.as_ref())),
                );
                break (InvocationState::Failed, None, Some(err.to_string()));
            }
            Some(Ok(Ok(Ok(output)))) => break (InvocationState::Succeeded, Some(output), None),
            Some(Ok(Ok(Err(ToolError::Cancelled)))) => {
                break (InvocationState::Cancelled, None, Some("cancelled by tool".to_string()));
            }
            Some(Ok(Ok(Err(err)))) => err,
        };

        if !err.is_transient() || attempt >= max_attempts {
            let message = CoreError::tool_execution(&tool_id, err.to_string()).to_string();
            break (InvocationState::Failed, None, Some(message));
        }

        let delay = spec.retry.backoff(attempt, err.retry_after_ms());
        let retry_at = Instant::now().checked_add(delay);
        if retry_at.map_or(true, |at| at >= deadline) {
            let message = CoreError::tool_execution(
                &tool_id,
                format!("{} (no time left to retry)", err),
            )
            .to_string();
            break (InvocationState::Failed, None, Some(message));
        }

        tracing::warn!(
            request_id = %request_id,
            tool_id = %tool_id,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "transient tool error, retrying"
        );
        progress.emit(ProgressEvent::ToolRetrying {
            request_id: request_id.clone(),
            tool_id: tool_id.clone(),
            attempt,
            delay_ms: delay.as_millis() as u64,
            error: err.to_string(),
        });

        let cancelled = tokio::select! {
            _ = cancel.cancelled() => true,
            _ = tokio::time::sleep(delay) => false,
        };
        if cancelled {
            break (InvocationState::Cancelled, None, Some("request cancelled".to_string()));
        }
    };

    ToolInvocation {
        id: spec.context.invocation_id().to_string(),
        request_id,
        tool_id,
        started_at,
        finished_at: Utc::now(),
        state,
        output,
        error,
        attempts: attempt,
    }
}
