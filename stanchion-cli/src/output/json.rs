//! JSON output formatting.

use anyhow::Result;
use serde::Serialize;
use serde_json::{Map, Value};

use stanchion_fetch::{
    AttemptRecord, CredentialStatus, OrchestratorError, ProbeVerdict, StreamSummary,
    StructuredResponse, ValidationReport,
};
use stanchion_providers::FeedError;

// ============================================================================
// Output Types
// ============================================================================

/// One failed attempt.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptOutput {
    pub backend: String,
    pub index: u32,
    pub kind: String,
    pub message: String,
    pub timeout_ms: u128,
    pub duration_ms: u128,
}

impl From<&AttemptRecord> for AttemptOutput {
    fn from(record: &AttemptRecord) -> Self {
        Self {
            backend: record.backend_id.clone(),
            index: record.index,
            kind: record.kind.to_string(),
            message: record.message.clone(),
            timeout_ms: record.timeout.as_millis(),
            duration_ms: record.duration.as_millis(),
        }
    }
}

/// Result of `generate`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOutput {
    pub topic: String,
    pub content_origin: String,
    pub backend: String,
    pub attempts: usize,
    pub elapsed_ms: u128,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_attempts: Vec<AttemptOutput>,
    pub value: Map<String, Value>,
}

impl GenerateOutput {
    /// Builds the output for a validated response.
    pub fn new(topic: &str, content_origin: &str, response: &StructuredResponse) -> Self {
        Self {
            topic: topic.to_string(),
            content_origin: content_origin.to_string(),
            backend: response.backend_id.clone(),
            attempts: response.attempt_count(),
            elapsed_ms: response.elapsed.as_millis(),
            failed_attempts: response.failed_attempts.iter().map(AttemptOutput::from).collect(),
            value: response.value.clone(),
        }
    }
}

/// Result of `stream` in JSON mode.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamOutput {
    pub topic: String,
    pub backend: String,
    pub text: String,
    pub chunks: usize,
    pub heartbeats: usize,
    pub completed: bool,
    pub attempts: usize,
    pub elapsed_ms: u128,
}

impl StreamOutput {
    /// Builds the output from the collected text and the summary.
    pub fn new(topic: &str, text: String, summary: &StreamSummary) -> Self {
        Self {
            topic: topic.to_string(),
            backend: summary.backend_id.clone(),
            text,
            chunks: summary.chunks,
            heartbeats: summary.heartbeats,
            completed: summary.completed,
            attempts: summary.failed_attempts.len() + 1,
            elapsed_ms: summary.elapsed.as_millis(),
        }
    }
}

/// One credential pool.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolOutput {
    pub name: String,
    pub size: usize,
    pub usable: usize,
    pub credentials: Vec<CredentialStatus>,
}

/// One probe verdict.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutput {
    pub pool: String,
    pub id: String,
    pub verdict: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub valid: bool,
}

impl ValidationOutput {
    /// Builds the output for one report.
    pub fn new(pool: &str, report: &ValidationReport) -> Self {
        let (verdict, detail) = match &report.verdict {
            ProbeVerdict::Accepted => ("accepted", None),
            ProbeVerdict::Rejected(reason) => ("rejected", Some(reason.clone())),
            ProbeVerdict::Inconclusive(reason) => ("inconclusive", Some(reason.clone())),
        };
        Self {
            pool: pool.to_string(),
            id: report.id.clone(),
            verdict,
            detail,
            valid: report.valid,
        }
    }
}

/// Backend with its attempt count.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendAttempts {
    pub backend: String,
    pub attempts: u32,
}

/// A failed command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureOutput {
    pub error: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub backends_tried: Vec<BackendAttempts>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<AttemptOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl FailureOutput {
    /// Builds the output for any command error.
    pub fn from_error(err: &anyhow::Error) -> Self {
        let mut output = Self {
            error: format!("{err:#}"),
            retryable: false,
            backends_tried: Vec::new(),
            attempts: Vec::new(),
            last_error: None,
        };

        if let Some(e) = err.downcast_ref::<OrchestratorError>() {
            output.retryable = e.is_retryable();
            if let Some(report) = e.report() {
                output.backends_tried = report
                    .attempts_per_backend
                    .iter()
                    .map(|(backend, attempts)| BackendAttempts {
                        backend: backend.clone(),
                        attempts: *attempts,
                    })
                    .collect();
                output.attempts = report.attempts.iter().map(AttemptOutput::from).collect();
                output.last_error.clone_from(&report.last_error);
            }
        } else if let Some(e) = err.downcast_ref::<FeedError>() {
            output.retryable = e.search_error().is_transient();
        }

        output
    }
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }
}
