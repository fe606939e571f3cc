//! Integration Tests Module
//!
//! End-to-end tests of the orchestration pipeline: planning, the execution
//! strategies, aggregation, the learning loop and configuration-built tool
//! sets. Tools are in-process closures unless a test says otherwise; no
//! reasoning provider is contacted.

// Shared tool builders and configuration
mod support;

// Prerequisite staging and cycle rejection
mod planning_test;

// Strategies, timeouts, retries, cancellation and essential failures
mod execution_test;

// Deduplication, correlation and determinism
mod aggregation_test;

// Learning feedback into scoring, insights and persistence
mod learning_test;

// Tool sets built from TOML configuration
mod config_test;
