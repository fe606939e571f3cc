//! Scoring
//!
//! Capability scoring of registered tools against an analysis request.

pub mod scorer;

pub use scorer::{CapabilityScorer, ScoreBreakdown, ScoredTool};
