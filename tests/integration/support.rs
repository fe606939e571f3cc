//! Shared fixtures for the integration tests.

use std::sync::Arc;
use std::time::Duration;

use review_cascade::config::RetryPolicy;
use review_cascade::{LearningStore, Orchestrator, OrchestratorConfig};
use review_cascade_core::{
    AnalysisTool, Location, RawFinding, Severity, ToolDescriptor, ToolError, ToolOutput,
};
use review_cascade_tools::{FunctionTool, ToolFuture, ToolRegistry};

/// Configuration with fast retries so failure paths finish quickly.
pub fn fast_config() -> OrchestratorConfig {
    let mut config = OrchestratorConfig::default();
    config.execution.retry = RetryPolicy {
        max_attempts: 3,
        initial_backoff_ms: 5,
        max_backoff_ms: 20,
        multiplier: 2.0,
    };
    config
}

pub fn orchestrator_with(
    config: OrchestratorConfig,
    tools: Vec<Arc<dyn AnalysisTool>>,
) -> Orchestrator {
    let registry = ToolRegistry::new();
    registry.register_all(tools).expect("fixture tools register");
    let learning = Arc::new(LearningStore::new(&config.learning));
    Orchestrator::new(config, Arc::new(registry), learning)
}

pub fn raw(
    category: &str,
    severity: Severity,
    file: &str,
    line: u32,
    confidence: f64,
) -> RawFinding {
    RawFinding::new(category, severity, Location::lines(file, line, line))
        .with_title(format!("{category} in {file}"))
        .with_confidence(confidence)
}

/// Tool returning `findings` immediately.
pub fn fixed(descriptor: ToolDescriptor, findings: Vec<RawFinding>) -> Arc<dyn AnalysisTool> {
    Arc::new(FunctionTool::fixed(descriptor, ToolOutput::with_findings(findings)))
}

/// Tool returning `findings` after `delay`.
pub fn delayed(
    descriptor: ToolDescriptor,
    delay: Duration,
    findings: Vec<RawFinding>,
) -> Arc<dyn AnalysisTool> {
    Arc::new(FunctionTool::new(descriptor, move |_ctx| -> ToolFuture {
        let findings = findings.clone();
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            Ok(ToolOutput::with_findings(findings))
        })
    }))
}

/// Tool that always fails permanently.
pub fn failing(descriptor: ToolDescriptor) -> Arc<dyn AnalysisTool> {
    Arc::new(FunctionTool::new(descriptor, |_ctx| -> ToolFuture {
        Box::pin(async { Err(ToolError::failed("analyzer crashed")) })
    }))
}

pub fn finding(category: &str) -> Vec<RawFinding> {
    vec![raw(category, Severity::Medium, "src/app.py", 10, 0.7)]
}
