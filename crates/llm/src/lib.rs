//! Review Cascade LLM
//!
//! The reasoning capability used by reasoning-backed analysis tools:
//! - `ReasoningProvider` trait (text prompt in, text out)
//! - OpenAI-compatible chat-completions implementation
//! - HTTP client factory and provider error classification

pub mod http_client;
pub mod openai;
pub mod provider;
pub mod types;

// Re-export main types
pub use http_client::build_http_client;
pub use openai::OpenAICompatibleProvider;
pub use provider::{parse_http_error, ReasoningProvider};
pub use types::*;
