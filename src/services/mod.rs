//! Services
//!
//! The orchestration pipeline, leaf-first:
//! - `learning` - execution history and scoring profiles
//! - `scoring` - capability scoring
//! - `planning` - prerequisite resolution into stages
//! - `execution` - strategies, timeouts and retries
//! - `aggregation` - deduplication and correlation of findings
//! - `orchestrator` - one request end to end
//!
//! `toolset` builds the registry from configuration, `snapshot` measures a
//! snapshot on disk and `progress` carries optional progress events.

pub mod aggregation;
pub mod execution;
pub mod learning;
pub mod orchestrator;
pub mod planning;
pub mod progress;
pub mod scoring;
pub mod snapshot;
pub mod toolset;

pub use aggregation::{AggregatedFindings, AggregationBuffer, AggregationConflict, ResultAggregator};
pub use execution::{ExecutionCoordinator, ExecutionOutcome, StrategyDecision};
pub use learning::{LearningInsights, LearningStore, ProfileSource};
pub use orchestrator::{
    ExecutionReport, OrchestrationMetrics, Orchestrator, PlanningOutcome, ReportStatus,
};
pub use planning::{DependencyResolver, ExecutionPlan};
pub use progress::{ProgressEvent, ProgressReporter};
pub use scoring::{CapabilityScorer, ScoredTool};
pub use snapshot::{measure_snapshot, SnapshotStats};
pub use toolset::build_registry;
