//! Search API error types.

use thiserror::Error;

/// Errors from the content search API.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The credential was rejected (401/403 or an auth-related message).
    #[error("Credential rejected: {0}")]
    Auth(String),

    /// Connection-level failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request timed out.
    #[error("Request timed out")]
    Timeout,

    /// Non-success HTTP status other than 401/403.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Status code.
        status: u16,
        /// Response body (truncated).
        body: String,
    },

    /// The API answered `success=false` for a reason unrelated to auth.
    #[error("API error: {0}")]
    Api(String),

    /// The response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The pool has no usable credential.
    #[error("No usable credentials in pool {0}")]
    NoCredentials(String),
}

impl SearchError {
    /// Returns true if the error should penalise the credential used.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Returns true for transport-class failures that never penalise a
    /// credential and may be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Status { status, .. } => *status == 429 || *status == 408 || *status >= 500,
            Self::Auth(_) | Self::Api(_) | Self::Decode(_) | Self::NoCredentials(_) => false,
        }
    }
}

impl From<stanchion_fetch::HttpError> for SearchError {
    fn from(err: stanchion_fetch::HttpError) -> Self {
        match err {
            stanchion_fetch::HttpError::Timeout => Self::Timeout,
            other => Self::Transport(other.to_string()),
        }
    }
}
