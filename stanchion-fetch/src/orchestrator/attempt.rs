//! Attempt bookkeeping for orchestrated requests.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

// ============================================================================
// Failure Kind
// ============================================================================

/// Why a single attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection-level failure or broken stream.
    Transport,
    /// The attempt exceeded its timeout.
    Timeout,
    /// Non-success HTTP status.
    Status(u16),
    /// The response did not match the declared shape.
    Validation,
    /// The stream finished without any content.
    EmptyStream,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "transport"),
            Self::Timeout => write!(f, "timeout"),
            Self::Status(code) => write!(f, "status {code}"),
            Self::Validation => write!(f, "validation"),
            Self::EmptyStream => write!(f, "empty stream"),
        }
    }
}

// ============================================================================
// Backend Attempt
// ============================================================================

/// One in-flight attempt against one backend.
///
/// Lives only for the duration of a single orchestrator call.
#[derive(Debug, Clone)]
pub struct BackendAttempt {
    /// Backend identifier.
    pub backend_id: String,
    /// Zero-based attempt index for this backend.
    pub index: u32,
    /// Timeout computed for this attempt.
    pub timeout: Duration,
    /// When the attempt started.
    pub started: Instant,
}

impl BackendAttempt {
    /// Starts an attempt now.
    pub fn start(backend_id: impl Into<String>, index: u32, timeout: Duration) -> Self {
        Self {
            backend_id: backend_id.into(),
            index,
            timeout,
            started: Instant::now(),
        }
    }
}

/// Record of a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// Backend identifier.
    pub backend_id: String,
    /// Zero-based attempt index for this backend.
    pub index: u32,
    /// Timeout the attempt ran under.
    pub timeout: Duration,
    /// Failure classification.
    pub kind: FailureKind,
    /// Underlying error message.
    pub message: String,
    /// How long the attempt took.
    pub duration: Duration,
}

impl AttemptRecord {
    /// Closes an attempt with a failure.
    pub fn failure(attempt: &BackendAttempt, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            backend_id: attempt.backend_id.clone(),
            index: attempt.index,
            timeout: attempt.timeout,
            kind,
            message: message.into(),
            duration: attempt.started.elapsed(),
        }
    }
}

// ============================================================================
// Exhaustion Report
// ============================================================================

/// Attempt history attached to a terminal failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExhaustionReport {
    /// Backends tried, in order, with the number of attempts each received.
    pub attempts_per_backend: Vec<(String, u32)>,
    /// Every failed attempt, in order.
    pub attempts: Vec<AttemptRecord>,
    /// Message of the last underlying error.
    pub last_error: Option<String>,
    /// Time spent across all attempts.
    pub elapsed: Duration,
}

impl ExhaustionReport {
    /// Backends tried, in priority order.
    pub fn backends_tried(&self) -> Vec<&str> {
        self.attempts_per_backend
            .iter()
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Total number of attempts made.
    pub fn total_attempts(&self) -> u32 {
        self.attempts_per_backend.iter().map(|(_, n)| n).sum()
    }
}

impl fmt::Display for ExhaustionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attempts_per_backend.is_empty() {
            write!(f, "no attempts made")?;
        } else {
            let tried: Vec<String> = self
                .attempts_per_backend
                .iter()
                .map(|(id, n)| format!("{id} x{n}"))
                .collect();
            write!(f, "tried [{}]", tried.join(", "))?;
        }
        write!(f, " in {:.1}s", self.elapsed.as_secs_f64())?;
        if let Some(ref last) = self.last_error {
            write!(f, "; last error: {last}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_display() {
        let report = ExhaustionReport {
            attempts_per_backend: vec![("modelA".to_string(), 2), ("modelB".to_string(), 1)],
            attempts: Vec::new(),
            last_error: Some("HTTP 503: busy".to_string()),
            elapsed: Duration::from_millis(1500),
        };
        assert_eq!(
            report.to_string(),
            "tried [modelA x2, modelB x1] in 1.5s; last error: HTTP 503: busy"
        );
        assert_eq!(report.total_attempts(), 3);
        assert_eq!(report.backends_tried(), vec!["modelA", "modelB"]);
    }

    #[test]
    fn test_failure_kind_display() {
        assert_eq!(FailureKind::Status(429).to_string(), "status 429");
        assert_eq!(FailureKind::EmptyStream.to_string(), "empty stream");
    }
}
