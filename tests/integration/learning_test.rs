//! Learning Integration Tests
//!
//! Execution history feeding back into scoring, insights and persistence.

use chrono::Utc;

use review_cascade::services::ProfileSource;
use review_cascade::{LearningStore, Orchestrator, OrchestratorConfig};
use review_cascade_core::{AnalysisRequest, ExecutionRecord, InvocationState, ToolDescriptor};

use crate::support::{failing, fast_config, finding, fixed, orchestrator_with};

fn record(tool_id: &str, index: usize, succeeded: bool) -> ExecutionRecord {
    ExecutionRecord {
        tool_id: tool_id.to_string(),
        request_id: format!("history-{index}"),
        category: "security".to_string(),
        context_size: 120,
        category_count: 1,
        duration_ms: 150,
        finding_count: if succeeded { 2 } else { 0 },
        state: if succeeded {
            InvocationState::Succeeded
        } else {
            InvocationState::Failed
        },
        mean_confidence: succeeded.then_some(0.8),
        error: (!succeeded).then(|| "analyzer crashed".to_string()),
        recorded_at: Utc::now(),
    }
}

fn seed(store: &LearningStore, tool_id: &str, successes: usize, total: usize) {
    for i in 0..total {
        store.record(record(tool_id, i, i < successes));
    }
}

#[test]
fn test_history_changes_ranking() {
    let orchestrator = orchestrator_with(
        OrchestratorConfig::default(),
        vec![
            fixed(ToolDescriptor::new("x_scanner", "security"), vec![]),
            fixed(ToolDescriptor::new("y_scanner", "security"), vec![]),
        ],
    );
    let request = AnalysisRequest::new("req", "/repo").with_categories(["security"]);

    // Without history the tie breaks by id.
    let before = orchestrator.plan(&request).unwrap().scored;
    assert_eq!(before[0].score, before[1].score);

    seed(orchestrator.learning(), "x_scanner", 45, 50);
    seed(orchestrator.learning(), "y_scanner", 10, 50);

    let after = orchestrator.plan(&request).unwrap().scored;
    assert_eq!(after[0].tool_id, "x_scanner");
    assert_eq!(after[1].tool_id, "y_scanner");
    assert!(after[0].score > after[1].score);
    assert!((after[0].breakdown.historical_success - 0.9).abs() < 1e-9);
    assert!((after[1].breakdown.historical_success - 0.2).abs() < 1e-9);
}

#[tokio::test]
async fn test_runs_update_profiles() {
    let orchestrator = orchestrator_with(
        fast_config(),
        vec![
            fixed(ToolDescriptor::new("steady", "security"), finding("xss")),
            failing(ToolDescriptor::new("unstable", "security")),
        ],
    );

    for i in 0..3 {
        orchestrator
            .run(AnalysisRequest::new(format!("req-{i}"), "/repo"))
            .await;
    }

    let learning = orchestrator.learning();
    let steady = learning.profile("steady");
    assert_eq!(steady.executions, 3);
    assert_eq!(steady.success_rate, 1.0);
    assert!((steady.mean_findings - 1.0).abs() < 1e-9);

    let unstable = learning.profile("unstable");
    assert_eq!(unstable.executions, 3);
    assert_eq!(unstable.success_rate, 0.0);
    assert_eq!(learning.history("unstable").len(), 3);
    assert_eq!(learning.request_outcomes().len(), 3);
}

#[test]
fn test_insights_rank_and_flag_tools() {
    let store = LearningStore::new(&Default::default());
    seed(&store, "x_scanner", 45, 50);
    seed(&store, "y_scanner", 10, 50);

    let insights = store.insights();
    assert_eq!(insights.tools_tracked, 2);
    assert_eq!(insights.total_executions, 100);
    assert_eq!(insights.ranking[0].tool_id, "x_scanner");
    assert_eq!(insights.underperforming, vec!["y_scanner".to_string()]);
}

#[tokio::test]
async fn test_learning_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("learning.json");

    let mut config = fast_config();
    config.learning.store_path = Some(path.clone());

    let first = orchestrator_with(
        config.clone(),
        vec![fixed(ToolDescriptor::new("steady", "security"), finding("xss"))],
    );
    first.run(AnalysisRequest::new("req-1", "/repo")).await;
    first.save_learning().unwrap();
    assert!(path.exists());

    let restored = LearningStore::load(&config.learning, &path).unwrap();
    assert_eq!(restored.profiles(), first.learning().profiles());
    assert_eq!(restored.request_outcomes().len(), 1);

    // A configuration-built orchestrator picks the same file up.
    let second = Orchestrator::from_config(config).unwrap();
    assert_eq!(second.learning().profile("steady").executions, 1);
}

#[test]
fn test_missing_store_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = LearningStore::load(&Default::default(), &dir.path().join("absent.json")).unwrap();
    assert!(store.is_empty());
    assert_eq!(store.profile("anything").success_rate, 0.5);
}
