//! Fetch error types.

use std::time::Duration;
use thiserror::Error;

use crate::orchestrator::{ExhaustionReport, FailureKind};

// ============================================================================
// HTTP Error
// ============================================================================

/// HTTP-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Request error.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Domain not allowed.
    #[error("Domain not allowed: {0}")]
    DomainNotAllowed(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Timeout.
    #[error("Request timed out")]
    Timeout,
}

impl HttpError {
    /// Converts a reqwest error, separating timeouts from other failures.
    pub fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else {
            Self::Request(error)
        }
    }
}

// ============================================================================
// Backend Error
// ============================================================================

/// Error returned by a single generation backend call.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Connection-level failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The call did not finish within its timeout.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Status code.
        status: u16,
        /// Response body (truncated).
        body: String,
    },

    /// The response could not be decoded.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The stream broke after it was opened.
    #[error("Stream error: {0}")]
    Stream(String),
}

impl BackendError {
    /// The failure kind recorded for this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Transport(_) | Self::Stream(_) => FailureKind::Transport,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Status { status, .. } => FailureKind::Status(*status),
            Self::Malformed(_) => FailureKind::Validation,
        }
    }
}

impl BackendError {
    /// Converts an HTTP error raised by a call made with `timeout`.
    pub fn from_http(err: HttpError, timeout: Duration) -> Self {
        match err {
            HttpError::Timeout => BackendError::Timeout(timeout),
            other => BackendError::Transport(other.to_string()),
        }
    }
}

// ============================================================================
// Validation Error
// ============================================================================

/// A structured response that does not match its declared schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No JSON object could be parsed from the text.
    #[error("Response is not valid JSON: {0}")]
    NotJson(String),

    /// The top-level value is not an object.
    #[error("Response is not a JSON object")]
    NotObject,

    /// A required field is absent or null.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// A field that must be a non-empty array is not an array.
    #[error("Field is not an array: {0}")]
    NotArray(String),

    /// A field that must be a non-empty array is empty.
    #[error("Array field is empty: {0}")]
    EmptyArray(String),
}

// ============================================================================
// Orchestrator Error
// ============================================================================

/// Terminal failure of an orchestrated request.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// No generation backends are configured.
    #[error("No generation backends configured")]
    NoBackends,

    /// The deadline budget ran out before a usable result arrived.
    #[error("Deadline budget exhausted: {0}")]
    DeadlineExhausted(ExhaustionReport),

    /// Every backend used up its attempts.
    #[error("All backends exhausted: {0}")]
    BackendsExhausted(ExhaustionReport),
}

impl OrchestratorError {
    /// Whether presentation logic should offer a "try again" affordance.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NoBackends)
    }

    /// The attempt history, when any attempts were made.
    pub fn report(&self) -> Option<&ExhaustionReport> {
        match self {
            Self::NoBackends => None,
            Self::DeadlineExhausted(report) | Self::BackendsExhausted(report) => Some(report),
        }
    }
}
