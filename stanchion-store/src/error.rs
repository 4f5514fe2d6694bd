//! Store error types.

use thiserror::Error;

/// Errors that can occur in the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The cache key cannot be stored.
    #[error("Invalid cache key: {0:?}")]
    InvalidKey(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Returns true if this is a transient error that might succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Io(_))
    }

    /// Builds a configuration error for a malformed variable.
    pub fn malformed(variable: &str, value: &str, expected: &str) -> Self {
        StoreError::Config(format!("{variable}={value:?} is not a valid {expected}"))
    }
}
