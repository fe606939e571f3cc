//! Execution
//!
//! Runs execution plans. The coordinator owns the per-run state; each
//! strategy only decides what to dispatch next.
//!
//! - `sequential` - one tool at a time, abort on essential-category failure
//! - `parallel` - stage by stage, bounded concurrency within a stage
//! - `priority` - highest score first under a resource budget
//! - `strategy` - adaptive strategy selection
//! - `invoke` - one invocation with timeout and retry

pub mod coordinator;
pub mod invoke;
mod parallel;
mod priority;
mod sequential;
pub mod strategy;

pub use coordinator::{ExecutionCoordinator, ExecutionOutcome};
pub use invoke::{invoke, InvocationSpec};
pub use strategy::{select_strategy, StrategyDecision};
