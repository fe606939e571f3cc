//! Error Handling
//!
//! Application-level error type. Orchestration errors from the core crate are
//! wrapped unchanged; this layer adds configuration-file and provider setup
//! concerns.

use review_cascade_core::CoreError;
use review_cascade_llm::LlmError;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Orchestration errors (registry, planning, execution)
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed TOML configuration files
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Reasoning provider setup errors
    #[error("Provider error: {0}")]
    Provider(#[from] LlmError),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The wrapped core error, if any.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            AppError::Core(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AppError> for String {
    fn from(err: AppError) -> String {
        err.to_string()
    }
}
