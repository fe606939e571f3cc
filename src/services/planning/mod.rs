//! Planning
//!
//! Prerequisite resolution and staging of scored tools.

pub mod plan;
pub mod resolver;

pub use plan::{DroppedTool, ExecutionPlan, PlannedTool, Stage};
pub use resolver::DependencyResolver;
