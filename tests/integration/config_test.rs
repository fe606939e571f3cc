//! Configuration Integration Tests
//!
//! Orchestrators built from TOML files, running real analyzer processes.

use review_cascade::utils::error::AppError;
use review_cascade::{Orchestrator, OrchestratorConfig, ReportStatus};
use review_cascade_core::{AnalysisRequest, ExecutionStrategy, InvocationState, Severity};

const PIPELINE: &str = r#"
use_builtin_catalog = false

[execution]
max_concurrency = 2
default_timeout_secs = 30

[execution.retry]
max_attempts = 1

[[tools]]
id = "injection_scan"
kind = "command"
category = "security"
program = "sh"
args = ["-c", '''echo '[{"category":"sql injection","severity":"critical","file":"src/db.py","line":12,"confidence":0.8}]' ''']
priority = 0.9

[[tools]]
id = "secret_scan"
kind = "command"
category = "security.secrets"
program = "sh"
args = ["-c", '''echo '{"findings":[{"type":"hardcoded secret","severity":"high","path":"src/settings.py","line":3}]}' ''']
prerequisites = ["injection_scan"]

[[tools]]
id = "style_check"
kind = "command"
category = "quality"
program = "sh"
args = ["-c", "echo boom >&2; exit 3"]
"#;

#[cfg(unix)]
#[tokio::test]
async fn test_command_pipeline_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("review-cascade.toml");
    std::fs::write(&path, PIPELINE).unwrap();

    let config = OrchestratorConfig::load(&path).unwrap();
    let orchestrator = Orchestrator::from_config(config).unwrap();
    assert_eq!(orchestrator.registry().len(), 3);

    let request = AnalysisRequest::new("req", dir.path().to_string_lossy())
        .with_strategy(ExecutionStrategy::Parallel);
    let report = orchestrator.run(request).await;

    assert_eq!(report.status, ReportStatus::CompletedWithErrors);
    let plan = report.plan.as_ref().unwrap();
    assert_eq!(plan.stage_of("secret_scan"), Some(1));

    let style = report.invocation("style_check").unwrap();
    assert_eq!(style.state, InvocationState::Failed);
    assert!(style.error.as_deref().unwrap_or_default().contains("boom"));

    let categories: Vec<&str> = report.findings.iter().map(|f| f.category.as_str()).collect();
    assert_eq!(categories, vec!["sql-injection", "hardcoded-secret"]);
    assert_eq!(report.findings[0].severity, Severity::Critical);
    assert_eq!(report.findings[1].tool_id, "secret_scan");
}

#[test]
fn test_invalid_values_are_rejected() {
    let err = OrchestratorConfig::from_toml_str("[execution]\nmax_concurrency = 0\n").unwrap_err();
    assert!(matches!(err, AppError::Config(_)));

    let err = OrchestratorConfig::from_toml_str("[scoring]\nrelevance = -1.0\n").unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn test_empty_file_gives_defaults() {
    let config = OrchestratorConfig::from_toml_str("").unwrap();
    assert_eq!(config, OrchestratorConfig::default());
    assert_eq!(config.execution.max_concurrency, 4);
    assert_eq!(config.planning.max_selected_tools, Some(8));
}

#[test]
fn test_reasoning_tool_requires_provider() {
    let config = OrchestratorConfig::from_toml_str(
        r#"
        [[tools]]
        id = "security_scanner"
        kind = "reasoning"
        "#,
    )
    .unwrap();
    let err = Orchestrator::from_config(config).err().unwrap();
    assert!(matches!(err, AppError::Config(_)));
}
