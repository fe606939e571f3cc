//! Aggregation
//!
//! Merges tool outputs into one de-duplicated, correlated finding set.
//!
//! - `dedup` - signature-based duplicate collapse and severity conflicts
//! - `correlation` - cross-tool grouping over related issue categories
//! - `aggregator` - per-request buffer and the end-to-end pass

pub mod aggregator;
pub mod correlation;
pub mod dedup;

pub use aggregator::{AggregatedFindings, AggregationBuffer, ResultAggregator};
pub use correlation::{correlate, RelationTable};
pub use dedup::{deduplicate, AggregationConflict};
