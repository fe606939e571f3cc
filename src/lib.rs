//! Review Cascade
//!
//! Orchestrates a heterogeneous set of code-analysis tools against one
//! repository snapshot and produces a single de-duplicated, prioritized
//! report. It includes:
//! - Configuration (`OrchestratorConfig`, TOML)
//! - The orchestration services: scoring, planning, execution, aggregation
//!   and learning
//! - Error types shared by the binary

pub mod config;
pub mod services;
pub mod utils;

pub use config::OrchestratorConfig;
pub use services::{
    ExecutionReport, LearningStore, Orchestrator, ProgressEvent, ProgressReporter, ReportStatus,
};
pub use utils::error::{AppError, AppResult};

