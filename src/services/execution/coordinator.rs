//! Execution Coordinator
//!
//! Runs an execution plan with one of the strategies and reports every tool's
//! terminal `ToolInvocation`, in completion order, on a channel. Each
//! invocation is also summarized as an `ExecutionRecord` in the learning
//! store.
//!
//! Request-level cancellation and essential-tool failures both stop the run:
//! in-flight tools are cancelled and tools that never started resolve as
//! `cancelled` (request cancelled) or `skipped` (essential failure).

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use review_cascade_core::{
    AnalysisRequest, ExecutionRecord, ExecutionStrategy, Finding, InvocationState, ToolContext,
    ToolInvocation, ToolOutput,
};
use review_cascade_tools::RegistrySnapshot;

use crate::config::{AdaptiveConfig, ExecutionConfig};
use crate::services::learning::LearningStore;
use crate::services::planning::{ExecutionPlan, Stage};
use crate::services::progress::{ProgressEvent, ProgressReporter};

use super::invoke::InvocationSpec;
use super::strategy::{select_strategy, StrategyDecision};
use super::{parallel, priority, sequential};

/// Result of running a plan.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    pub strategy: ExecutionStrategy,
    /// Terminal invocations in completion order
    pub invocations: Vec<ToolInvocation>,
    /// One record per invocation, same order
    pub records: Vec<ExecutionRecord>,
    /// Set when an essential tool failed
    pub essential_failure: Option<String>,
    pub cancelled: bool,
}

impl ExecutionOutcome {
    pub fn invocation(&self, tool_id: &str) -> Option<&ToolInvocation> {
        self.invocations.iter().find(|i| i.tool_id == tool_id)
    }

    pub fn count(&self, state: InvocationState) -> usize {
        self.invocations.iter().filter(|i| i.state == state).count()
    }
}

pub struct ExecutionCoordinator {
    config: ExecutionConfig,
    adaptive: AdaptiveConfig,
    learning: Arc<LearningStore>,
}

impl ExecutionCoordinator {
    pub fn new(
        config: ExecutionConfig,
        adaptive: AdaptiveConfig,
        learning: Arc<LearningStore>,
    ) -> Self {
        Self {
            config,
            adaptive,
            learning,
        }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Resolve the strategy for a planned request.
    pub fn decide(&self, request: &AnalysisRequest, plan: &ExecutionPlan) -> StrategyDecision {
        select_strategy(request, plan, self.config.max_concurrency, &self.adaptive)
    }

    /// Run `plan` with `strategy`.
    ///
    /// `adaptive` is resolved through `decide` first. Invocations are sent to
    /// `sink` as they finish; a closed sink does not stop the run.
    #[allow(clippy::too_many_arguments)]
    pub async fn execute(
        &self,
        request: &AnalysisRequest,
        plan: &ExecutionPlan,
        tools: &RegistrySnapshot,
        strategy: ExecutionStrategy,
        sink: mpsc::Sender<ToolInvocation>,
        cancel: CancellationToken,
        progress: ProgressReporter,
    ) -> ExecutionOutcome {
        let strategy = match strategy {
            ExecutionStrategy::Adaptive => self.decide(request, plan).strategy,
            other => other,
        };

        tracing::info!(
            request_id = %request.id,
            %strategy,
            tools = plan.tool_count(),
            stages = plan.stage_count(),
            "executing plan"
        );

        let mut run = Run {
            coordinator: self,
            request,
            plan,
            tools,
            abort: cancel.child_token(),
            cancel,
            sink,
            progress,
            outcomes: BTreeMap::new(),
            outputs: BTreeMap::new(),
            invocations: Vec::new(),
            records: Vec::new(),
            essential_failure: None,
        };

        match strategy {
            ExecutionStrategy::Sequential => sequential::run(&mut run).await,
            ExecutionStrategy::Parallel | ExecutionStrategy::Adaptive => {
                parallel::run(&mut run).await
            }
            ExecutionStrategy::PriorityBased => {
                let budget = request.resource_budget.or(self.config.default_resource_budget);
                priority::run(&mut run, budget).await
            }
        }

        let cancelled = run.cancel.is_cancelled();
        if cancelled {
            tracing::warn!(request_id = %request.id, "request cancelled");
        }

        ExecutionOutcome {
            strategy,
            invocations: run.invocations,
            records: run.records,
            essential_failure: run.essential_failure,
            cancelled,
        }
    }
}

/// State of one plan execution, owned by the strategy loop.
pub(super) struct Run<'a> {
    coordinator: &'a ExecutionCoordinator,
    pub request: &'a AnalysisRequest,
    pub plan: &'a ExecutionPlan,
    tools: &'a RegistrySnapshot,
    /// Request-level cancellation from the caller
    cancel: CancellationToken,
    /// Child of `cancel`, also cancelled on essential failure
    pub abort: CancellationToken,
    sink: mpsc::Sender<ToolInvocation>,
    pub progress: ProgressReporter,
    outcomes: BTreeMap<String, InvocationState>,
    outputs: BTreeMap<String, ToolOutput>,
    invocations: Vec<ToolInvocation>,
    records: Vec<ExecutionRecord>,
    essential_failure: Option<String>,
}

impl<'a> Run<'a> {
    pub fn max_concurrency(&self) -> usize {
        self.coordinator.config.max_concurrency.max(1)
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.coordinator.config
    }

    /// Why nothing else may start, if the run has been stopped.
    pub fn halt_reason(&self) -> Option<String> {
        if self.cancel.is_cancelled() {
            return Some("request cancelled".to_string());
        }
        self.essential_failure
            .as_ref()
            .map(|tool| format!("aborted after essential tool '{}' failed", tool))
    }

    pub fn state_of(&self, tool_id: &str) -> Option<InvocationState> {
        self.outcomes.get(tool_id).copied()
    }

    fn prerequisites(&self, tool_id: &str) -> impl Iterator<Item = &'a String> + 'a {
        self.plan
            .descriptor(tool_id)
            .into_iter()
            .flat_map(|d| d.prerequisites.iter())
    }

    /// A prerequisite that finished without succeeding, if any.
    pub fn failed_prerequisite(&self, tool_id: &str) -> Option<String> {
        self.prerequisites(tool_id).find_map(|p| match self.state_of(p) {
            Some(state) if !state.is_success() => {
                Some(format!("prerequisite '{}' did not succeed ({})", p, state))
            }
            _ => None,
        })
    }

    /// Whether every prerequisite has succeeded.
    pub fn prerequisites_succeeded(&self, tool_id: &str) -> bool {
        self.prerequisites(tool_id)
            .all(|p| self.state_of(p) == Some(InvocationState::Succeeded))
    }

    pub fn stage_started(&self, stage: &Stage) {
        tracing::debug!(
            request_id = %self.request.id,
            stage = stage.index,
            tools = stage.len(),
            "stage started"
        );
        self.progress.emit(ProgressEvent::StageStarted {
            request_id: self.request.id.clone(),
            stage: stage.index,
            tool_ids: stage.tool_ids.clone(),
        });
    }

    /// Build the detached invocation of `tool_id`, or the failed invocation
    /// of a tool missing from the registry snapshot.
    pub fn prepare(&self, tool_id: &str) -> Result<InvocationSpec, ToolInvocation> {
        let invocation_id = Uuid::new_v4().to_string();
        let tool = match self.tools.tool(tool_id) {
            Ok(tool) => tool,
            Err(err) => {
                let now = Utc::now();
                return Err(ToolInvocation {
                    id: invocation_id,
                    request_id: self.request.id.clone(),
                    tool_id: tool_id.to_string(),
                    started_at: now,
                    finished_at: now,
                    state: InvocationState::Failed,
                    output: None,
                    error: Some(err.to_string()),
                    attempts: 0,
                });
            }
        };

        let prerequisite_outputs: BTreeMap<String, ToolOutput> = self
            .prerequisites(tool_id)
            .filter_map(|p| self.outputs.get(p).map(|o| (p.clone(), o.clone())))
            .collect();

        let descriptor_timeout = self.plan.descriptor(tool_id).and_then(|d| d.timeout_secs);
        Ok(InvocationSpec {
            tool,
            context: ToolContext::new(self.request, invocation_id, tool_id)
                .with_prerequisite_outputs(prerequisite_outputs),
            timeout: self.config().timeout_for(tool_id, descriptor_timeout),
            retry: self.config().retry.clone(),
        })
    }

    /// Resolve a tool that will never be dispatched.
    pub async fn skip(&mut self, tool_id: &str, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::info!(
            request_id = %self.request.id,
            tool_id = %tool_id,
            %reason,
            "tool skipped"
        );
        let invocation = ToolInvocation::skipped(
            Uuid::new_v4().to_string(),
            self.request.id.clone(),
            tool_id,
            reason,
        );
        self.finish(invocation).await;
    }

    /// Resolve a tool left behind by a stopped run.
    pub async fn halt(&mut self, tool_id: &str) {
        if self.cancel.is_cancelled() {
            let invocation = ToolInvocation::cancelled(
                Uuid::new_v4().to_string(),
                self.request.id.clone(),
                tool_id,
            );
            self.finish(invocation).await;
        } else {
            let reason = self
                .halt_reason()
                .unwrap_or_else(|| "execution stopped".to_string());
            self.skip(tool_id, reason).await;
        }
    }

    /// Resolve a tool whose invocation task ended without reporting back.
    pub async fn lost(&mut self, tool_id: &str, err: &JoinError) {
        let reason = if err.is_panic() {
            "invocation task panicked"
        } else {
            "invocation task was aborted"
        };
        tracing::error!(
            request_id = %self.request.id,
            tool_id = %tool_id,
            error = %err,
            "{}",
            reason
        );
        let now = Utc::now();
        let invocation = ToolInvocation {
            id: Uuid::new_v4().to_string(),
            request_id: self.request.id.clone(),
            tool_id: tool_id.to_string(),
            started_at: now,
            finished_at: now,
            state: InvocationState::Failed,
            output: None,
            error: Some(reason.to_string()),
            attempts: 1,
        };
        self.finish(invocation).await;
    }

    /// Record a terminal invocation.
    pub async fn finish(&mut self, invocation: ToolInvocation) {
        let descriptor = self.plan.descriptor(&invocation.tool_id);
        let category = descriptor.map(|d| d.category.clone()).unwrap_or_default();
        let baseline = descriptor.map(|d| d.confidence_baseline).unwrap_or(0.5);
        let essential = descriptor.map(|d| d.essential).unwrap_or(false);

        let confidences: Vec<f64> = invocation
            .output
            .as_ref()
            .map(|o| {
                o.findings
                    .iter()
                    .map(|raw| {
                        Finding::from_raw(raw.clone(), &invocation.tool_id, baseline).confidence
                    })
                    .collect()
            })
            .unwrap_or_default();
        let record = ExecutionRecord::from_invocation(
            &invocation,
            category,
            self.request.size.file_count,
            self.request.categories.count().unwrap_or(0),
            &confidences,
        );
        self.coordinator.learning.record(record.clone());
        self.records.push(record);

        match invocation.state {
            InvocationState::Succeeded => tracing::info!(
                request_id = %self.request.id,
                tool_id = %invocation.tool_id,
                duration_ms = invocation.duration_ms(),
                findings = invocation.finding_count(),
                attempts = invocation.attempts,
                "tool succeeded"
            ),
            InvocationState::Failed | InvocationState::TimedOut => tracing::warn!(
                request_id = %self.request.id,
                tool_id = %invocation.tool_id,
                state = %invocation.state,
                error = invocation.error.as_deref().unwrap_or(""),
                "tool did not succeed"
            ),
            InvocationState::Skipped | InvocationState::Cancelled => {}
        }

        self.progress.emit(ProgressEvent::ToolFinished {
            request_id: self.request.id.clone(),
            tool_id: invocation.tool_id.clone(),
            state: invocation.state,
            duration_ms: invocation.duration_ms(),
            findings: invocation.finding_count(),
        });

        if essential
            && invocation.state.was_dispatched()
            && !invocation.state.is_success()
            && self.essential_failure.is_none()
        {
            tracing::error!(
                request_id = %self.request.id,
                tool_id = %invocation.tool_id,
                "essential tool failed, stopping execution"
            );
            self.essential_failure = Some(invocation.tool_id.clone());
            self.abort.cancel();
        }

        self.outcomes
            .insert(invocation.tool_id.clone(), invocation.state);
        if invocation.state.is_success() {
            if let Some(output) = invocation.output.as_ref() {
                self.outputs.insert(invocation.tool_id.clone(), output.clone());
            }
        }

        if self.sink.send(invocation.clone()).await.is_err() {
            tracing::debug!(request_id = %self.request.id, "invocation sink closed");
        }
        self.invocations.push(invocation);
    }
}
