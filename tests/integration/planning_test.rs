//! Planning Integration Tests
//!
//! Prerequisite staging, forced inclusion, exclusion and cycle rejection.

use std::collections::BTreeMap;
use std::sync::Arc;

use review_cascade::services::{CapabilityScorer, DependencyResolver, ProfileSource};
use review_cascade::{LearningStore, OrchestratorConfig};
use review_cascade_core::{AnalysisRequest, AnalysisTool, CoreError, ToolDescriptor};
use review_cascade_tools::{RegistrySnapshot, ToolRegistry};

use crate::support::{finding, fixed, orchestrator_with};

fn tool(id: &str, category: &str, prerequisites: &[&str]) -> Arc<dyn AnalysisTool> {
    let descriptor = ToolDescriptor::new(id, category)
        .with_prerequisites(prerequisites.iter().map(|s| s.to_string()));
    fixed(descriptor, finding(category))
}

#[test]
fn test_prerequisite_staging() {
    let orchestrator = orchestrator_with(
        OrchestratorConfig::default(),
        vec![
            tool("a", "security", &[]),
            tool("b", "security", &["a"]),
            tool("c", "quality", &[]),
        ],
    );

    let planning = orchestrator
        .plan(&AnalysisRequest::new("req", "/repo"))
        .unwrap();
    let stages: Vec<Vec<String>> = planning
        .plan
        .stages
        .iter()
        .map(|s| s.tool_ids.clone())
        .collect();
    assert_eq!(stages, vec![vec!["a", "c"], vec!["b"]]);
    assert_eq!(planning.plan.stage_of("b"), Some(1));
}

#[test]
fn test_low_scoring_prerequisite_is_forced() {
    let parser = ToolDescriptor::new("parser", "quality").with_priority(0.0);
    let taint = ToolDescriptor::new("taint", "security")
        .with_priority(0.9)
        .with_prerequisite("parser");
    let orchestrator = orchestrator_with(
        OrchestratorConfig::default(),
        vec![fixed(parser, vec![]), fixed(taint, finding("taint"))],
    );

    let request = AnalysisRequest::new("req", "/repo").with_categories(["security"]);
    let planning = orchestrator.plan(&request).unwrap();

    let parser = planning.plan.tool("parser").unwrap();
    assert!(parser.forced);
    assert_eq!(parser.stage, 0);
    assert!(!planning.plan.tool("taint").unwrap().forced);
    assert_eq!(planning.plan.stage_of("taint"), Some(1));
}

#[test]
fn test_excluded_prerequisite_drops_dependent() {
    let orchestrator = orchestrator_with(
        OrchestratorConfig::default(),
        vec![
            tool("parser", "quality", &[]),
            tool("taint", "security", &["parser"]),
            tool("secrets", "security", &[]),
        ],
    );

    let request = AnalysisRequest::new("req", "/repo").exclude("parser");
    let planning = orchestrator.plan(&request).unwrap();

    assert!(planning.plan.tool("parser").is_none());
    assert!(planning.plan.tool("taint").is_none());
    assert!(planning.plan.tool("secrets").is_some());
    assert!(planning
        .plan
        .dropped
        .iter()
        .any(|d| d.tool_id == "taint" && d.reason.contains("parser")));
}

/// Deterministic pseudo-random generator for graph shapes.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }
}

#[test]
fn test_random_acyclic_graphs_stage_prerequisites_first() {
    let mut config = OrchestratorConfig::default();
    config.planning.inclusion_threshold = 0.0;
    config.planning.max_selected_tools = None;

    let mut rng = Lcg(0x5eed);
    for round in 0..25 {
        let count = 3 + (rng.next() % 10) as usize;
        let mut tools = Vec::with_capacity(count);
        for i in 0..count {
            let mut descriptor = ToolDescriptor::new(format!("t{:02}", i), "security")
                .with_priority((rng.next() % 100) as f64 / 100.0);
            for j in 0..i {
                if rng.next() % 4 == 0 {
                    descriptor = descriptor.with_prerequisite(format!("t{:02}", j));
                }
            }
            tools.push(fixed(descriptor, vec![]));
        }

        let orchestrator = orchestrator_with(config.clone(), tools);
        let plan = orchestrator
            .plan(&AnalysisRequest::new(format!("req-{round}"), "/repo"))
            .unwrap()
            .plan;

        assert_eq!(plan.tool_count(), count, "round {round}");
        for (id, planned) in &plan.tools {
            for prerequisite in &planned.descriptor.prerequisites {
                let before = plan.stage_of(prerequisite).unwrap();
                assert!(before < planned.stage, "round {round}: {prerequisite} !< {id}");
            }
        }
        let staged: usize = plan.stages.iter().map(|s| s.len()).sum();
        assert_eq!(staged, count);
    }
}

#[test]
fn test_registration_rejects_cycles() {
    let registry = ToolRegistry::new();
    let err = registry
        .register_all(vec![
            tool("x", "security", &["y"]),
            tool("y", "security", &["x"]),
        ])
        .unwrap_err();

    assert!(matches!(err, CoreError::DependencyCycle(_)));
    assert!(registry.is_empty());
}

#[test]
fn test_resolver_rejects_cyclic_descriptors() {
    let snapshot = RegistrySnapshot::from_tools(vec![
        tool("x", "security", &["y"]),
        tool("y", "security", &["x"]),
        tool("z", "quality", &[]),
    ]);
    let descriptors = snapshot.descriptors();
    let request = AnalysisRequest::new("req", "/repo");

    let learning = LearningStore::new(&Default::default());
    let profiles: &dyn ProfileSource = &learning;
    let scored = CapabilityScorer::new(Default::default()).score(&request, &descriptors, profiles);
    let err = DependencyResolver::new(Default::default())
        .resolve(&request, &descriptors, &scored)
        .unwrap_err();

    match err {
        CoreError::DependencyCycle(members) => {
            assert!(members.contains(&"x".to_string()));
            assert!(members.contains(&"y".to_string()));
            assert!(!members.contains(&"z".to_string()));
        }
        other => panic!("expected a dependency cycle, got {other:?}"),
    }
}

#[test]
fn test_scores_are_ordered_and_deterministic() {
    let mut tools = Vec::new();
    for (id, priority) in [("low", 0.1), ("high", 0.9), ("mid", 0.5), ("mid2", 0.5)] {
        tools.push(fixed(
            ToolDescriptor::new(id, "security").with_priority(priority),
            vec![],
        ));
    }
    let orchestrator = orchestrator_with(OrchestratorConfig::default(), tools);
    let request = AnalysisRequest::new("req", "/repo");

    let first = orchestrator.plan(&request).unwrap().scored;
    let order: Vec<&str> = first.iter().map(|s| s.tool_id.as_str()).collect();
    assert_eq!(order, vec!["high", "mid", "mid2", "low"]);

    let by_id: BTreeMap<String, f64> = first.iter().map(|s| (s.tool_id.clone(), s.score)).collect();
    for _ in 0..5 {
        let again = orchestrator.plan(&request).unwrap().scored;
        for scored in again {
            assert_eq!(by_id[&scored.tool_id], scored.score);
        }
    }
}
