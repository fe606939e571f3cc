//! Learning
//!
//! Records execution outcomes and derives the scoring profiles consumed by
//! the capability scorer.

pub mod insights;
pub mod store;

pub use insights::{CombinationInsight, LearningInsights, ToolInsight};
pub use store::{LearningSnapshot, LearningStore, ProfileSource, RequestOutcome};
