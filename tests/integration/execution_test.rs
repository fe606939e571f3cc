//! Execution Integration Tests
//!
//! Strategy behavior observed through full orchestrator runs.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use review_cascade::{ProgressReporter, ReportStatus};
use review_cascade_core::{
    AnalysisRequest, AnalysisTool, ExecutionStrategy, InvocationState, RawFinding, Severity,
    ToolDescriptor, ToolError, ToolOutput,
};
use review_cascade_tools::{FunctionTool, ToolFuture};

use crate::support::{delayed, failing, fast_config, finding, fixed, orchestrator_with, raw};

fn request(strategy: ExecutionStrategy) -> AnalysisRequest {
    AnalysisRequest::new("req", "/repo").with_strategy(strategy)
}

#[tokio::test]
async fn test_timeout_is_isolated_to_one_tool() {
    let slow = ToolDescriptor::new("slow", "security")
        .with_priority(0.9)
        .with_timeout_secs(1);
    let orchestrator = orchestrator_with(
        fast_config(),
        vec![
            delayed(slow, Duration::from_secs(5), finding("xss")),
            fixed(ToolDescriptor::new("fast", "security"), finding("sql injection")),
        ],
    );

    let started = Instant::now();
    let report = orchestrator.run(request(ExecutionStrategy::Parallel)).await;
    assert!(started.elapsed() < Duration::from_secs(4));

    assert_eq!(report.status, ReportStatus::CompletedWithErrors);
    let slow = report.invocation("slow").unwrap();
    assert_eq!(slow.state, InvocationState::TimedOut);
    assert_eq!(slow.attempts, 1);
    assert_eq!(
        report.invocation("fast").map(|i| i.state),
        Some(InvocationState::Succeeded)
    );
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].tool_id, "fast");
}

#[tokio::test]
async fn test_parallel_respects_concurrency_limit() {
    let mut config = fast_config();
    config.execution.max_concurrency = 4;
    config.planning.max_selected_tools = None;

    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let tools: Vec<Arc<dyn AnalysisTool>> = (0..20)
        .map(|i| {
            let running = running.clone();
            let peak = peak.clone();
            let tool: Arc<dyn AnalysisTool> = Arc::new(FunctionTool::new(
                ToolDescriptor::new(format!("tool_{:02}", i), "security"),
                move |_ctx| -> ToolFuture {
                    let running = running.clone();
                    let peak = peak.clone();
                    Box::pin(async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok(ToolOutput::default())
                    })
                },
            ));
            tool
        })
        .collect();

    let orchestrator = orchestrator_with(config, tools);
    let report = orchestrator.run(request(ExecutionStrategy::Parallel)).await;

    assert_eq!(report.status, ReportStatus::Completed);
    assert_eq!(report.invocations.len(), 20);
    assert!(report
        .invocations
        .iter()
        .all(|i| i.state == InvocationState::Succeeded));
    assert!(peak.load(Ordering::SeqCst) <= 4);
    assert!(peak.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn test_priority_budget_skips_lowest_scored() {
    let tools = [("p_high", 0.9), ("p_mid", 0.6), ("p_low", 0.3)]
        .into_iter()
        .map(|(id, priority)| {
            fixed(
                ToolDescriptor::new(id, "security")
                    .with_priority(priority)
                    .with_cost(10.0),
                finding("xss"),
            )
        })
        .collect();
    let orchestrator = orchestrator_with(fast_config(), tools);

    let report = orchestrator
        .run(request(ExecutionStrategy::PriorityBased).with_budget(25.0))
        .await;

    assert_eq!(report.status, ReportStatus::CompletedWithErrors);
    for id in ["p_high", "p_mid"] {
        assert_eq!(
            report.invocation(id).map(|i| i.state),
            Some(InvocationState::Succeeded),
            "{id}"
        );
    }
    let low = report.invocation("p_low").unwrap();
    assert_eq!(low.state, InvocationState::Skipped);
    assert!(low.error.as_deref().unwrap_or_default().contains("budget"));
}

#[tokio::test]
async fn test_sequential_failure_aborts_remaining_plan() {
    let orchestrator = orchestrator_with(
        fast_config(),
        vec![
            failing(ToolDescriptor::new("first", "security").with_priority(0.9)),
            fixed(
                ToolDescriptor::new("second", "security").with_priority(0.2),
                finding("xss"),
            ),
        ],
    );

    let report = orchestrator.run(request(ExecutionStrategy::Sequential)).await;

    assert_eq!(report.status, ReportStatus::CompletedWithErrors);
    assert_eq!(
        report.invocation("first").map(|i| i.state),
        Some(InvocationState::Failed)
    );
    let second = report.invocation("second").unwrap();
    assert_eq!(second.state, InvocationState::Skipped);
    assert!(second.error.as_deref().unwrap_or_default().contains("first"));
    assert!(report.findings.is_empty());
}

#[tokio::test]
async fn test_sequential_continues_past_non_essential_category() {
    let orchestrator = orchestrator_with(
        fast_config(),
        vec![
            failing(ToolDescriptor::new("linter", "quality").with_priority(0.9)),
            fixed(
                ToolDescriptor::new("scanner", "security").with_priority(0.2),
                finding("xss"),
            ),
        ],
    );

    let report = orchestrator.run(request(ExecutionStrategy::Sequential)).await;

    assert_eq!(report.status, ReportStatus::CompletedWithErrors);
    assert_eq!(
        report.invocation("scanner").map(|i| i.state),
        Some(InvocationState::Succeeded)
    );
    assert_eq!(report.findings.len(), 1);
}

#[tokio::test]
async fn test_essential_failure_fails_request() {
    let orchestrator = orchestrator_with(
        fast_config(),
        vec![
            failing(
                ToolDescriptor::new("gate", "security")
                    .with_priority(0.9)
                    .essential(),
            ),
            fixed(ToolDescriptor::new("fast", "security"), finding("xss")),
            fixed(
                ToolDescriptor::new("after", "security").with_prerequisite("fast"),
                finding("sql injection"),
            ),
        ],
    );

    let report = orchestrator.run(request(ExecutionStrategy::Parallel)).await;

    assert_eq!(report.status, ReportStatus::Failed);
    assert!(report.is_failed());
    assert!(report.findings.is_empty());
    assert!(report.reason.as_deref().unwrap_or_default().contains("gate"));
    assert_eq!(
        report.invocation("after").map(|i| i.state),
        Some(InvocationState::Skipped)
    );
}

#[tokio::test]
async fn test_cancellation_keeps_partial_results() {
    let orchestrator = orchestrator_with(
        fast_config(),
        vec![
            fixed(ToolDescriptor::new("quick", "security"), finding("xss")),
            delayed(
                ToolDescriptor::new("slow", "security"),
                Duration::from_secs(5),
                finding("sql injection"),
            ),
        ],
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            cancel.cancel();
        });
    }

    let started = Instant::now();
    let report = orchestrator
        .run_with(
            request(ExecutionStrategy::Parallel),
            cancel,
            ProgressReporter::disabled(),
        )
        .await;
    assert!(started.elapsed() < Duration::from_secs(3));

    assert!(report.cancelled);
    assert_eq!(report.status, ReportStatus::CompletedWithErrors);
    assert_eq!(
        report.invocation("slow").map(|i| i.state),
        Some(InvocationState::Cancelled)
    );
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].tool_id, "quick");
}

#[tokio::test]
async fn test_prerequisite_output_reaches_dependent() {
    let parser: Arc<dyn AnalysisTool> = Arc::new(FunctionTool::fixed(
        ToolDescriptor::new("parser", "quality"),
        ToolOutput::default().with_summary("modules:7"),
    ));
    let consumer: Arc<dyn AnalysisTool> = Arc::new(FunctionTool::new(
        ToolDescriptor::new("consumer", "security").with_prerequisite("parser"),
        |ctx| -> ToolFuture {
            let upstream = ctx
                .prerequisite_output("parser")
                .map(|o| o.summary.clone());
            Box::pin(async move {
                let summary = upstream.ok_or_else(|| ToolError::failed("parser output missing"))?;
                Ok(ToolOutput::with_findings(vec![raw(
                    "xss",
                    Severity::High,
                    "src/view.js",
                    4,
                    0.8,
                )
                .with_detail(summary)]))
            })
        },
    ));
    let orchestrator = orchestrator_with(fast_config(), vec![parser, consumer]);

    for strategy in [
        ExecutionStrategy::Sequential,
        ExecutionStrategy::Parallel,
        ExecutionStrategy::PriorityBased,
    ] {
        let report = orchestrator.run(request(strategy)).await;
        assert_eq!(report.status, ReportStatus::Completed, "{strategy}");
        assert_eq!(report.findings.len(), 1, "{strategy}");
        assert_eq!(report.findings[0].detail, "modules:7", "{strategy}");
    }
}

#[tokio::test]
async fn test_rate_limited_tool_is_retried() {
    let calls = Arc::new(AtomicU32::new(0));
    let flaky: Arc<dyn AnalysisTool> = {
        let calls = calls.clone();
        Arc::new(FunctionTool::new(
            ToolDescriptor::new("flaky", "security"),
            move |_ctx| -> ToolFuture {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Box::pin(async move {
                    if call < 3 {
                        Err(ToolError::rate_limited("slow down", Some(1)))
                    } else {
                        Ok(ToolOutput::with_findings(vec![RawFinding::new(
                            "xss",
                            Severity::Low,
                            review_cascade_core::Location::file("a.js"),
                        )]))
                    }
                })
            },
        ))
    };
    let orchestrator = orchestrator_with(fast_config(), vec![flaky]);

    let report = orchestrator.run(request(ExecutionStrategy::Parallel)).await;

    assert_eq!(report.status, ReportStatus::Completed);
    let invocation = report.invocation("flaky").unwrap();
    assert_eq!(invocation.state, InvocationState::Succeeded);
    assert_eq!(invocation.attempts, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_permanent_failure_is_not_retried() {
    let calls = Arc::new(AtomicU32::new(0));
    let broken: Arc<dyn AnalysisTool> = {
        let calls = calls.clone();
        Arc::new(FunctionTool::new(
            ToolDescriptor::new("broken", "security"),
            move |_ctx| -> ToolFuture {
                calls.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { Err(ToolError::failed("bad input")) })
            },
        ))
    };
    let orchestrator = orchestrator_with(fast_config(), vec![broken]);

    let report = orchestrator.run(request(ExecutionStrategy::Parallel)).await;

    assert_eq!(
        report.invocation("broken").map(|i| i.state),
        Some(InvocationState::Failed)
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_adaptive_small_single_category_runs_sequentially() {
    let orchestrator = orchestrator_with(
        fast_config(),
        vec![
            fixed(ToolDescriptor::new("scanner", "security"), finding("xss")),
            fixed(ToolDescriptor::new("secrets", "security.secrets"), finding("hardcoded secret")),
        ],
    );

    let report = orchestrator
        .run(
            AnalysisRequest::new("req", "/repo")
                .with_categories(["security"])
                .with_size(12, 40_000),
        )
        .await;

    let decision = report.strategy.unwrap();
    assert_eq!(decision.requested, ExecutionStrategy::Adaptive);
    assert_eq!(decision.strategy, ExecutionStrategy::Sequential);
    assert_eq!(report.status, ReportStatus::Completed);
}

#[tokio::test]
async fn test_every_planned_tool_reports_exactly_once() {
    let mut config = fast_config();
    config.planning.max_selected_tools = None;
    let orchestrator = orchestrator_with(
        config,
        vec![
            fixed(ToolDescriptor::new("a", "security"), finding("xss")),
            failing(ToolDescriptor::new("b", "security")),
            fixed(ToolDescriptor::new("c", "security").with_prerequisite("b"), vec![]),
            fixed(ToolDescriptor::new("d", "quality").with_prerequisite("a"), vec![]),
        ],
    );

    for strategy in [
        ExecutionStrategy::Sequential,
        ExecutionStrategy::Parallel,
        ExecutionStrategy::PriorityBased,
    ] {
        let report = orchestrator.run(request(strategy)).await;
        let mut ids: Vec<&str> = report.invocations.iter().map(|i| i.tool_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b", "c", "d"], "{strategy}");
        assert_eq!(report.records.len(), 4, "{strategy}");
        assert_eq!(
            report.invocation("c").map(|i| i.state),
            Some(InvocationState::Skipped),
            "{strategy}"
        );
    }
}

/// Panics when dropped, which happens outside the tool's own poll once a
/// timeout abandons the future.
struct PanicOnDrop;

impl Drop for PanicOnDrop {
    fn drop(&mut self) {
        panic!("cleanup blew up");
    }
}

#[tokio::test]
async fn test_dead_invocation_task_fails_its_tool() {
    let mut config = fast_config();
    config.planning.max_selected_tools = None;
    let wedged: Arc<dyn AnalysisTool> = Arc::new(FunctionTool::new(
        ToolDescriptor::new("wedged", "quality")
            .with_priority(0.9)
            .with_timeout_secs(1),
        |_ctx| -> ToolFuture {
            Box::pin(async {
                let _guard = PanicOnDrop;
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(ToolOutput::default())
            })
        },
    ));
    let orchestrator = orchestrator_with(
        config,
        vec![
            wedged,
            fixed(ToolDescriptor::new("fine", "security"), finding("xss")),
            fixed(ToolDescriptor::new("after", "quality").with_prerequisite("wedged"), vec![]),
        ],
    );

    for strategy in [
        ExecutionStrategy::Sequential,
        ExecutionStrategy::Parallel,
        ExecutionStrategy::PriorityBased,
    ] {
        let report = orchestrator.run(request(strategy)).await;
        assert_eq!(report.invocations.len(), 3, "{strategy}");

        let wedged = report.invocation("wedged").unwrap();
        assert_eq!(wedged.state, InvocationState::Failed, "{strategy}");
        assert!(wedged.error.as_deref().unwrap().contains("panicked"), "{strategy}");
        assert_eq!(
            report.invocation("after").map(|i| i.state),
            Some(InvocationState::Skipped),
            "{strategy}"
        );
        assert_eq!(
            report.invocation("fine").map(|i| i.state),
            Some(InvocationState::Succeeded),
            "{strategy}"
        );
    }
}
