//! Aggregation Integration Tests
//!
//! Findings from several tools collapse into one deterministic report.

use std::time::Duration;

use review_cascade::config::AggregationConfig;
use review_cascade::services::ResultAggregator;
use review_cascade::ReportStatus;
use review_cascade_core::{AnalysisRequest, ExecutionStrategy, Finding, Severity, ToolDescriptor};

use crate::support::{delayed, fast_config, fixed, orchestrator_with, raw};

fn scenario(delays: [u64; 3]) -> Vec<std::sync::Arc<dyn review_cascade_core::AnalysisTool>> {
    vec![
        delayed(
            ToolDescriptor::new("scanner", "security"),
            Duration::from_millis(delays[0]),
            vec![
                raw("sql injection", Severity::Critical, "src/db.py", 20, 0.8),
                raw("hardcoded secret", Severity::High, "src/settings.py", 3, 0.6),
            ],
        ),
        delayed(
            ToolDescriptor::new("secrets", "security.secrets"),
            Duration::from_millis(delays[1]),
            vec![
                raw("Hardcoded Secret", Severity::High, "./src/settings.py", 3, 0.9),
                raw("credentials", Severity::Medium, "src/settings.py", 3, 0.5),
            ],
        ),
        delayed(
            ToolDescriptor::new("linter", "quality"),
            Duration::from_millis(delays[2]),
            vec![raw("unused import", Severity::Low, "src/db.py", 1, 0.4)],
        ),
    ]
}

#[tokio::test]
async fn test_report_is_independent_of_completion_order() {
    let forward = orchestrator_with(fast_config(), scenario([10, 60, 110]));
    let backward = orchestrator_with(fast_config(), scenario([110, 60, 10]));
    let request = AnalysisRequest::new("req", "/repo").with_strategy(ExecutionStrategy::Parallel);

    let a = forward.run(request.clone()).await;
    let b = backward.run(request).await;

    assert_eq!(a.status, ReportStatus::Completed);
    assert_eq!(a.findings, b.findings);
    assert_eq!(a.conflicts, b.conflicts);

    let order: Vec<&str> = a.findings.iter().map(|f| f.category.as_str()).collect();
    assert_eq!(
        order,
        vec!["sql-injection", "hardcoded-secret", "credentials", "unused-import"]
    );

    let secret = &a.findings[1];
    assert_eq!(secret.tool_id, "secrets");
    assert!(secret.corroborating_tools.contains("scanner"));
    assert!((secret.confidence - 1.0).abs() < 1e-9);
}

#[test]
fn test_duplicates_collapse_with_corroboration() {
    let aggregator = ResultAggregator::new(AggregationConfig::default());
    let findings = vec![
        Finding::from_raw(raw("xss", Severity::High, "web/app.js", 8, 0.7), "a", 0.5),
        Finding::from_raw(raw("XSS", Severity::High, "web/app.js", 8, 0.8), "b", 0.5),
    ];

    let result = aggregator.aggregate(findings);

    assert_eq!(result.len(), 1);
    assert!(result.conflicts.is_empty());
    let finding = &result.findings[0];
    assert_eq!(finding.tool_id, "b");
    assert_eq!(
        finding.corroborating_tools.iter().map(String::as_str).collect::<Vec<_>>(),
        vec!["a"]
    );
    assert!((finding.confidence - 0.9).abs() < 1e-9);
}

#[test]
fn test_corroboration_bonus_is_capped() {
    let aggregator = ResultAggregator::new(AggregationConfig::default());
    let findings = ["a", "b", "c", "d"]
        .iter()
        .map(|tool| {
            Finding::from_raw(raw("xss", Severity::High, "web/app.js", 8, 0.5), tool, 0.5)
        })
        .collect();

    let result = aggregator.aggregate(findings);

    assert_eq!(result.len(), 1);
    assert_eq!(result.findings[0].corroborating_tools.len(), 3);
    assert!((result.findings[0].confidence - 0.7).abs() < 1e-9);
}

#[test]
fn test_severity_disagreement_is_reported() {
    let aggregator = ResultAggregator::new(AggregationConfig::default());
    let findings = vec![
        Finding::from_raw(raw("xss", Severity::Low, "web/app.js", 8, 0.9), "a", 0.5),
        Finding::from_raw(raw("xss", Severity::Critical, "web/app.js", 8, 0.6), "b", 0.5),
    ];

    let result = aggregator.aggregate(findings);

    assert_eq!(result.len(), 1);
    assert_eq!(result.findings[0].tool_id, "a");
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(result.conflicts[0].kept_tool, "a");
    assert_eq!(result.conflicts[0].severities.len(), 2);
}

#[test]
fn test_every_permutation_aggregates_identically() {
    let aggregator = ResultAggregator::new(AggregationConfig::default());
    let base = vec![
        Finding::from_raw(raw("xss", Severity::High, "web/app.js", 8, 0.7), "a", 0.5),
        Finding::from_raw(raw("xss", Severity::Medium, "web/app.js", 8, 0.7), "b", 0.5),
        Finding::from_raw(raw("sql injection", Severity::High, "db.py", 2, 0.6), "c", 0.5),
    ];
    let expected = aggregator.aggregate(base.clone());

    let permutations = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
    for order in permutations {
        let findings = order.iter().map(|&i| base[i].clone()).collect();
        assert_eq!(aggregator.aggregate(findings), expected, "{order:?}");
    }
}

#[tokio::test]
async fn test_identical_fixed_tools_report_once() {
    let orchestrator = orchestrator_with(
        fast_config(),
        vec![
            fixed(
                ToolDescriptor::new("one", "security"),
                vec![raw("xss", Severity::High, "a.js", 1, 0.6)],
            ),
            fixed(
                ToolDescriptor::new("two", "security"),
                vec![raw("xss", Severity::High, "a.js", 1, 0.6)],
            ),
        ],
    );

    let report = orchestrator.run(AnalysisRequest::new("req", "/repo")).await;

    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].tool_id, "one");
    assert!(report.findings[0].corroborating_tools.contains("two"));
}
