//! Core error types for `stanchion`.

use thiserror::Error;

/// Core error type for `stanchion` operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A cache key or topic that cannot be used.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Invalid data from an upstream response.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}
