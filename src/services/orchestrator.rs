//! Orchestrator
//!
//! Serves one analysis request end to end: score, resolve, pick a strategy,
//! execute, aggregate, and feed the outcome back into the learning store.
//! Every request resolves to an `ExecutionReport`; planning errors produce
//! a `FAILED` report before any tool runs.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use review_cascade_core::{
    AnalysisRequest, CoreResult, ExecutionRecord, Finding, InvocationState, ToolInvocation,
};
use review_cascade_tools::{RegistrySnapshot, ToolRegistry};

use crate::config::OrchestratorConfig;
use crate::utils::error::AppResult;

use super::aggregation::{AggregationBuffer, AggregationConflict, ResultAggregator};
use super::execution::{ExecutionCoordinator, ExecutionOutcome, StrategyDecision};
use super::learning::{LearningStore, RequestOutcome};
use super::planning::{DependencyResolver, ExecutionPlan};
use super::progress::{ProgressEvent, ProgressReporter};
use super::scoring::{CapabilityScorer, ScoredTool};
use super::toolset::build_registry;

// ============================================================================
// Report
// ============================================================================

/// Terminal status of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Completed,
    CompletedWithErrors,
    Failed,
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportStatus::Completed => write!(f, "COMPLETED"),
            ReportStatus::CompletedWithErrors => write!(f, "COMPLETED_WITH_ERRORS"),
            ReportStatus::Failed => write!(f, "FAILED"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationMetrics {
    pub execution_time_ms: u64,
    pub tools_planned: usize,
    pub tools_succeeded: usize,
    /// Succeeded tools over planned tools
    pub tool_success_rate: f64,
    /// Mean confidence of the reported findings
    pub finding_quality: f64,
    /// Categories of succeeded tools over categories of registered tools
    pub category_coverage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub request_id: String,
    pub status: ReportStatus,
    /// Why the request failed or completed with errors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<ExecutionPlan>,
    pub findings: Vec<Finding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<AggregationConflict>,
    pub records: Vec<ExecutionRecord>,
    pub invocations: Vec<ToolInvocation>,
    pub metrics: OrchestrationMetrics,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionReport {
    fn failed_before_execution(
        request: &AnalysisRequest,
        reason: String,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            request_id: request.id.clone(),
            status: ReportStatus::Failed,
            reason: Some(reason),
            strategy: None,
            plan: None,
            findings: Vec::new(),
            conflicts: Vec::new(),
            records: Vec::new(),
            invocations: Vec::new(),
            metrics: OrchestrationMetrics::default(),
            cancelled: false,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == ReportStatus::Failed
    }

    pub fn invocation(&self, tool_id: &str) -> Option<&ToolInvocation> {
        self.invocations.iter().find(|i| i.tool_id == tool_id)
    }

    pub fn record(&self, tool_id: &str) -> Option<&ExecutionRecord> {
        self.records.iter().find(|r| r.tool_id == tool_id)
    }
}

/// Everything decided before execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningOutcome {
    pub scored: Vec<ScoredTool>,
    pub plan: ExecutionPlan,
    pub decision: StrategyDecision,
}

// ============================================================================
// Orchestrator
// ============================================================================

pub struct Orchestrator {
    config: OrchestratorConfig,
    registry: Arc<ToolRegistry>,
    learning: Arc<LearningStore>,
    scorer: CapabilityScorer,
    resolver: DependencyResolver,
    coordinator: ExecutionCoordinator,
    aggregator: ResultAggregator,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        registry: Arc<ToolRegistry>,
        learning: Arc<LearningStore>,
    ) -> Self {
        Self {
            scorer: CapabilityScorer::new(config.scoring.clone()),
            resolver: DependencyResolver::new(config.planning.clone()),
            coordinator: ExecutionCoordinator::new(
                config.execution.clone(),
                config.adaptive.clone(),
                learning.clone(),
            ),
            aggregator: ResultAggregator::new(config.aggregation.clone()),
            config,
            registry,
            learning,
        }
    }

    /// Build the registry and learning store a configuration describes.
    pub fn from_config(config: OrchestratorConfig) -> AppResult<Self> {
        config.validate()?;
        let registry = Arc::new(build_registry(&config)?);
        let learning = match &config.learning.store_path {
            Some(path) => LearningStore::load(&config.learning, path)?,
            None => LearningStore::new(&config.learning),
        };
        Ok(Self::new(config, registry, Arc::new(learning)))
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn learning(&self) -> &Arc<LearningStore> {
        &self.learning
    }

    /// Persist the learning store when a store path is configured.
    pub fn save_learning(&self) -> AppResult<()> {
        if let Some(path) = &self.config.learning.store_path {
            self.save_learning_to(path)?;
        }
        Ok(())
    }

    pub fn save_learning_to(&self, path: &Path) -> AppResult<()> {
        self.learning.save(path)
    }

    /// Score, resolve and pick a strategy without running anything.
    pub fn plan(&self, request: &AnalysisRequest) -> CoreResult<PlanningOutcome> {
        self.plan_with(request, &self.registry.snapshot())
    }

    fn plan_with(
        &self,
        request: &AnalysisRequest,
        snapshot: &RegistrySnapshot,
    ) -> CoreResult<PlanningOutcome> {
        let descriptors = snapshot.descriptors();
        let scored = self
            .scorer
            .score(request, &descriptors, self.learning.as_ref());
        let plan = self.resolver.resolve(request, &descriptors, &scored)?;
        let decision = self.coordinator.decide(request, &plan);
        Ok(PlanningOutcome {
            scored,
            plan,
            decision,
        })
    }

    pub async fn run(&self, request: AnalysisRequest) -> ExecutionReport {
        self.run_with(request, CancellationToken::new(), ProgressReporter::disabled())
            .await
    }

    /// Run a request. Cancelling `cancel` stops in-flight tools; findings of
    /// tools that already succeeded are still reported.
    pub async fn run_with(
        &self,
        request: AnalysisRequest,
        cancel: CancellationToken,
        progress: ProgressReporter,
    ) -> ExecutionReport {
        let started_at = Utc::now();
        let clock = Instant::now();
        let snapshot = self.registry.snapshot();

        tracing::info!(
            request_id = %request.id,
            snapshot = %request.snapshot,
            registered = snapshot.len(),
            "analysis request received"
        );

        let PlanningOutcome { plan, decision, .. } = match self.plan_with(&request, &snapshot) {
            Ok(planning) => planning,
            Err(err) => {
                tracing::error!(request_id = %request.id, error = %err, "planning failed");
                let report =
                    ExecutionReport::failed_before_execution(&request, err.to_string(), started_at);
                self.completed(&report, &progress);
                return report;
            }
        };

        tracing::info!(
            request_id = %request.id,
            strategy = %decision.strategy,
            reasoning = %decision.reasoning,
            "strategy selected"
        );
        progress.emit(ProgressEvent::Planned {
            request_id: request.id.clone(),
            strategy: decision.strategy,
            stages: plan.stage_count(),
            tools: plan.tool_count(),
            reasoning: decision.reasoning.clone(),
        });

        // Each planned tool reports exactly once, so the channel never fills.
        let (tx, mut rx) = mpsc::channel::<ToolInvocation>(plan.tool_count().max(1));
        let buffer = AggregationBuffer::new();
        let consumer = {
            let buffer = buffer.clone();
            let baselines: BTreeMap<String, f64> = plan
                .tools
                .iter()
                .map(|(id, t)| (id.clone(), t.descriptor.confidence_baseline))
                .collect();
            tokio::spawn(async move {
                while let Some(invocation) = rx.recv().await {
                    let baseline = baselines.get(&invocation.tool_id).copied().unwrap_or(0.5);
                    buffer.add_invocation(&invocation, baseline);
                }
            })
        };

        let outcome = self
            .coordinator
            .execute(
                &request,
                &plan,
                &snapshot,
                decision.strategy,
                tx,
                cancel,
                progress.clone(),
            )
            .await;
        if let Err(err) = consumer.await {
            tracing::error!(request_id = %request.id, error = %err, "finding consumer aborted");
        }

        let (status, reason, aggregated) = match &outcome.essential_failure {
            Some(tool_id) => {
                buffer.drain();
                (
                    ReportStatus::Failed,
                    Some(format!("essential tool '{}' did not succeed", tool_id)),
                    Default::default(),
                )
            }
            None => {
                let aggregated = self.aggregator.aggregate_buffer(&buffer);
                let (status, reason) = completion_status(&outcome);
                (status, reason, aggregated)
            }
        };

        let metrics = self.metrics(&plan, &snapshot, &outcome, &aggregated.findings, clock);
        self.learning.record_request(RequestOutcome {
            request_id: request.id.clone(),
            tools: outcome
                .invocations
                .iter()
                .filter(|i| i.state.was_dispatched())
                .map(|i| i.tool_id.clone())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
            execution_time_ms: metrics.execution_time_ms,
            tool_success_rate: metrics.tool_success_rate,
            finding_quality: metrics.finding_quality,
            category_coverage: metrics.category_coverage,
            recorded_at: Utc::now(),
        });

        let report = ExecutionReport {
            request_id: request.id.clone(),
            status,
            reason,
            strategy: Some(StrategyDecision {
                strategy: outcome.strategy,
                ..decision
            }),
            plan: Some(plan),
            findings: aggregated.findings,
            conflicts: aggregated.conflicts,
            records: outcome.records,
            invocations: outcome.invocations,
            metrics,
            cancelled: outcome.cancelled,
            started_at,
            finished_at: Utc::now(),
        };
        self.completed(&report, &progress);
        report
    }

    fn metrics(
        &self,
        plan: &ExecutionPlan,
        snapshot: &RegistrySnapshot,
        outcome: &ExecutionOutcome,
        findings: &[Finding],
        clock: Instant,
    ) -> OrchestrationMetrics {
        let tools_planned = plan.tool_count();
        let succeeded: Vec<&ToolInvocation> = outcome
            .invocations
            .iter()
            .filter(|i| i.state == InvocationState::Succeeded)
            .collect();

        let covered: BTreeSet<&str> = succeeded
            .iter()
            .filter_map(|i| plan.descriptor(&i.tool_id))
            .map(|d| d.category.as_str())
            .collect();
        let all_categories: BTreeSet<String> = snapshot
            .descriptors()
            .into_values()
            .map(|d| d.category)
            .collect();

        OrchestrationMetrics {
            execution_time_ms: clock.elapsed().as_millis() as u64,
            tools_planned,
            tools_succeeded: succeeded.len(),
            tool_success_rate: ratio(succeeded.len(), tools_planned),
            finding_quality: if findings.is_empty() {
                0.0
            } else {
                findings.iter().map(|f| f.confidence).sum::<f64>() / findings.len() as f64
            },
            category_coverage: ratio(covered.len(), all_categories.len()),
        }
    }

    fn completed(&self, report: &ExecutionReport, progress: &ProgressReporter) {
        match report.status {
            ReportStatus::Failed => tracing::error!(
                request_id = %report.request_id,
                reason = report.reason.as_deref().unwrap_or(""),
                "request failed"
            ),
            status => tracing::info!(
                request_id = %report.request_id,
                %status,
                findings = report.findings.len(),
                duration_ms = report.metrics.execution_time_ms,
                "request completed"
            ),
        }
        progress.emit(ProgressEvent::Completed {
            request_id: report.request_id.clone(),
            status: report.status,
            findings: report.findings.len(),
        });
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Completed when every planned tool succeeded; otherwise completed with
/// errors, naming what went wrong.
fn completion_status(outcome: &ExecutionOutcome) -> (ReportStatus, Option<String>) {
    if outcome.cancelled {
        return (
            ReportStatus::CompletedWithErrors,
            Some("request cancelled; partial results".to_string()),
        );
    }
    let unsuccessful: Vec<String> = outcome
        .invocations
        .iter()
        .filter(|i| !i.state.is_success())
        .map(|i| format!("{} ({})", i.tool_id, i.state))
        .collect();
    if unsuccessful.is_empty() {
        (ReportStatus::Completed, None)
    } else {
        (
            ReportStatus::CompletedWithErrors,
            Some(format!("unsuccessful tools: {}", unsuccessful.join(", "))),
        )
    }
}
