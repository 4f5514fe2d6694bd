//! Multi-backend request orchestration.
//!
//! Backends are tried in priority order. Each backend gets
//! `max_retries + 1` attempts with capped exponential backoff between them,
//! and every attempt draws from one shared [`Deadline`]. Before each attempt
//! the remaining budget is recomputed; once it is at or below the safety
//! margin nothing further is tried.

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, instrument, warn};

use super::attempt::{AttemptRecord, BackendAttempt, ExhaustionReport, FailureKind};
use super::backend::{ChatBackend, ChunkStream, Prompt};
use super::schema::{ResponseSchema, StructuredResponse};
use super::settings::OrchestratorSettings;
use super::stream::{MarkerGate, StreamChunk, StreamSummary};
use crate::budget::Deadline;
use crate::error::OrchestratorError;

// ============================================================================
// Attempt Plan
// ============================================================================

/// Walks the backend × attempt grid for one logical request.
struct AttemptPlan<'a> {
    backends: &'a [Arc<dyn ChatBackend>],
    settings: &'a OrchestratorSettings,
    deadline: Deadline,
    backend_index: usize,
    attempt: u32,
    tried: Vec<(String, u32)>,
    failures: Vec<AttemptRecord>,
    deadline_hit: bool,
}

impl<'a> AttemptPlan<'a> {
    fn new(
        backends: &'a [Arc<dyn ChatBackend>],
        settings: &'a OrchestratorSettings,
        deadline: Deadline,
    ) -> Self {
        Self {
            backends,
            settings,
            deadline,
            backend_index: 0,
            attempt: 0,
            tried: Vec::new(),
            failures: Vec::new(),
            deadline_hit: false,
        }
    }

    /// Starts the next attempt, or returns `None` when nothing may be tried.
    fn next_attempt(&mut self, cap: Duration) -> Option<(Arc<dyn ChatBackend>, BackendAttempt)> {
        let backend = Arc::clone(self.backends.get(self.backend_index)?);

        let Some(attempt_timeout) = self
            .deadline
            .attempt_timeout(cap, self.settings.safety_margin)
        else {
            self.deadline_hit = true;
            warn!(
                remaining_ms = self.deadline.remaining().as_millis(),
                "Deadline budget exhausted, no further attempts"
            );
            return None;
        };

        if self.attempt == 0 {
            self.tried.push((backend.id().to_string(), 0));
        }
        if let Some((_, count)) = self.tried.last_mut() {
            *count += 1;
        }

        debug!(
            backend = %backend.id(),
            attempt = self.attempt,
            timeout_ms = attempt_timeout.as_millis(),
            "Starting attempt"
        );

        let attempt = BackendAttempt::start(backend.id(), self.attempt, attempt_timeout);
        Some((backend, attempt))
    }

    /// Records a failed attempt, then backs off or moves to the next backend.
    async fn fail(&mut self, attempt: &BackendAttempt, kind: FailureKind, message: String) {
        warn!(
            backend = %attempt.backend_id,
            attempt = attempt.index,
            kind = %kind,
            error = %message,
            "Attempt failed"
        );
        self.failures
            .push(AttemptRecord::failure(attempt, kind, message));

        if attempt.index + 1 < self.settings.retry.attempts() {
            self.attempt = attempt.index + 1;
            let delay = self.deadline.clamp_sleep(
                self.settings.retry.delay_for_attempt(attempt.index),
                self.settings.safety_margin,
            );
            if !delay.is_zero() {
                debug!(delay_ms = delay.as_millis(), "Backing off");
                sleep(delay).await;
            }
            return;
        }

        self.backend_index += 1;
        self.attempt = 0;
        if let Some(next) = self.backends.get(self.backend_index) {
            info!(from = %attempt.backend_id, to = %next.id(), "Switching backend");
        }
    }

    /// Consumes the plan, returning the failures seen before success.
    fn into_failures(self) -> (Vec<AttemptRecord>, Duration) {
        (self.failures, self.deadline.elapsed())
    }

    /// Consumes the plan, producing the terminal error.
    fn exhausted(self) -> OrchestratorError {
        let report = ExhaustionReport {
            last_error: self.failures.last().map(|f| f.message.clone()),
            attempts_per_backend: self.tried,
            attempts: self.failures,
            elapsed: self.deadline.elapsed(),
        };

        warn!(report = %report, deadline = self.deadline_hit, "Request exhausted");

        if self.deadline_hit {
            OrchestratorError::DeadlineExhausted(report)
        } else {
            OrchestratorError::BackendsExhausted(report)
        }
    }
}

// ============================================================================
// Stream Attempt
// ============================================================================

/// How one streaming attempt ended.
enum StreamEnd {
    Finished,
    Broken(FailureKind, String),
    Failed(FailureKind, String),
}

#[derive(Default)]
struct StreamCounters {
    chunks: usize,
    heartbeats: usize,
    chars: usize,
}

impl StreamCounters {
    fn deliver<F: FnMut(StreamChunk)>(&mut self, text: String, on_chunk: &mut F) {
        if text.is_empty() {
            return;
        }
        self.chunks += 1;
        self.chars += text.chars().count();
        on_chunk(StreamChunk::text(text));
    }
}

/// Drains one stream into `on_chunk` until it ends, breaks, or times out.
async fn drain_stream<F>(
    mut stream: ChunkStream,
    attempt: &BackendAttempt,
    heartbeat: Duration,
    marker: Option<&str>,
    counters: &mut StreamCounters,
    on_chunk: &mut F,
) -> StreamEnd
where
    F: FnMut(StreamChunk),
{
    let attempt_deadline = attempt.started + attempt.timeout;
    let mut gate = MarkerGate::new(marker);

    loop {
        let now = Instant::now();
        if now >= attempt_deadline {
            let message = format!("stream timed out after {:?}", attempt.timeout);
            return if counters.chunks > 0 {
                StreamEnd::Broken(FailureKind::Timeout, message)
            } else {
                StreamEnd::Failed(FailureKind::Timeout, message)
            };
        }

        let wait = heartbeat.min(attempt_deadline - now);
        match timeout(wait, stream.next()).await {
            Err(_) => {
                if wait == heartbeat {
                    counters.heartbeats += 1;
                    on_chunk(StreamChunk::heartbeat());
                }
            }
            Ok(Some(Ok(text))) => {
                if let Some(released) = gate.push(&text) {
                    counters.deliver(released, on_chunk);
                }
            }
            Ok(Some(Err(e))) => {
                return if counters.chunks > 0 {
                    StreamEnd::Broken(e.kind(), e.to_string())
                } else {
                    StreamEnd::Failed(e.kind(), e.to_string())
                };
            }
            Ok(None) => {
                if let Some(released) = gate.finish() {
                    counters.deliver(released, on_chunk);
                }
                return if counters.chunks > 0 {
                    StreamEnd::Finished
                } else {
                    StreamEnd::Failed(
                        FailureKind::EmptyStream,
                        "stream ended without content".to_string(),
                    )
                };
            }
        }
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Issues prompts to a prioritised list of generation backends.
pub struct Orchestrator {
    backends: Vec<Arc<dyn ChatBackend>>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    /// Creates an orchestrator. The first backend has the highest priority.
    pub fn new(backends: Vec<Arc<dyn ChatBackend>>, settings: OrchestratorSettings) -> Self {
        Self { backends, settings }
    }

    /// Settings in effect.
    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Backend identifiers in priority order.
    pub fn backend_ids(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.id()).collect()
    }

    /// Starts a deadline with the configured budget.
    pub fn start_deadline(&self) -> Deadline {
        self.settings.start_deadline()
    }

    /// Requests a structured result that satisfies `schema`.
    ///
    /// Transport failures, timeouts, error statuses and responses failing
    /// validation are all retried the same way. The first validated response
    /// is returned immediately.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::NoBackends`] if none are configured, or an
    /// exhaustion error carrying the full attempt history.
    #[instrument(skip(self, prompt, schema, deadline), fields(backends = self.backends.len()))]
    pub async fn request_structured(
        &self,
        prompt: &Prompt,
        schema: &ResponseSchema,
        deadline: Deadline,
    ) -> Result<StructuredResponse, OrchestratorError> {
        if self.backends.is_empty() {
            return Err(OrchestratorError::NoBackends);
        }

        let mut plan = AttemptPlan::new(&self.backends, &self.settings, deadline);

        while let Some((backend, attempt)) = plan.next_attempt(self.settings.request_timeout) {
            let result = timeout(attempt.timeout, backend.complete(prompt, attempt.timeout)).await;

            let (kind, message) = match result {
                Err(_) => (
                    FailureKind::Timeout,
                    format!("timed out after {:?}", attempt.timeout),
                ),
                Ok(Err(e)) => (e.kind(), e.to_string()),
                Ok(Ok(text)) => match schema.validate(&text) {
                    Ok(value) => {
                        let backend_id = attempt.backend_id;
                        info!(backend = %backend_id, attempt = attempt.index, "Structured request succeeded");
                        let (failed_attempts, elapsed) = plan.into_failures();
                        return Ok(StructuredResponse {
                            backend_id,
                            value,
                            failed_attempts,
                            elapsed,
                        });
                    }
                    Err(e) => (FailureKind::Validation, e.to_string()),
                },
            };

            plan.fail(&attempt, kind, message).await;
        }

        Err(plan.exhausted())
    }

    /// Streams a response, forwarding each chunk to `on_chunk` as it arrives.
    ///
    /// `on_error` is called once, only after every backend, attempt and the
    /// deadline are exhausted.
    ///
    /// # Errors
    ///
    /// Returns the same error passed to `on_error`.
    pub async fn request_stream<F, E>(
        &self,
        prompt: &Prompt,
        on_chunk: F,
        on_error: E,
        deadline: Deadline,
    ) -> Result<StreamSummary, OrchestratorError>
    where
        F: FnMut(StreamChunk) + Send,
        E: FnOnce(&OrchestratorError) + Send,
    {
        self.request_stream_with_marker(prompt, None, on_chunk, on_error, deadline)
            .await
    }

    /// Like [`Orchestrator::request_stream`], withholding text until `marker`
    /// appears. The first delivered chunk then begins exactly at the marker.
    ///
    /// A stream that ends without any content is a failed attempt. A stream
    /// that breaks after content was delivered is not replayed; the summary
    /// reports it as incomplete.
    ///
    /// # Errors
    ///
    /// Returns the same error passed to `on_error`.
    #[instrument(skip(self, prompt, on_chunk, on_error, deadline), fields(backends = self.backends.len()))]
    pub async fn request_stream_with_marker<F, E>(
        &self,
        prompt: &Prompt,
        marker: Option<&str>,
        mut on_chunk: F,
        on_error: E,
        deadline: Deadline,
    ) -> Result<StreamSummary, OrchestratorError>
    where
        F: FnMut(StreamChunk) + Send,
        E: FnOnce(&OrchestratorError) + Send,
    {
        if self.backends.is_empty() {
            let err = OrchestratorError::NoBackends;
            on_error(&err);
            return Err(err);
        }

        let mut plan = AttemptPlan::new(&self.backends, &self.settings, deadline);
        let mut counters = StreamCounters::default();

        while let Some((backend, attempt)) = plan.next_attempt(self.settings.stream_timeout) {
            let opened = timeout(attempt.timeout, backend.open_stream(prompt, attempt.timeout)).await;

            let end = match opened {
                Err(_) => StreamEnd::Failed(
                    FailureKind::Timeout,
                    format!("stream did not open within {:?}", attempt.timeout),
                ),
                Ok(Err(e)) => StreamEnd::Failed(e.kind(), e.to_string()),
                Ok(Ok(stream)) => {
                    drain_stream(
                        stream,
                        &attempt,
                        self.settings.heartbeat,
                        marker,
                        &mut counters,
                        &mut on_chunk,
                    )
                    .await
                }
            };

            let completed = match end {
                StreamEnd::Finished => true,
                StreamEnd::Broken(kind, message) => {
                    warn!(
                        backend = %attempt.backend_id,
                        kind = %kind,
                        error = %message,
                        "Stream broke after content was delivered"
                    );
                    false
                }
                StreamEnd::Failed(kind, message) => {
                    plan.fail(&attempt, kind, message).await;
                    continue;
                }
            };

            info!(
                backend = %attempt.backend_id,
                chunks = counters.chunks,
                completed,
                "Stream finished"
            );
            let (failed_attempts, elapsed) = plan.into_failures();
            return Ok(StreamSummary {
                backend_id: attempt.backend_id,
                chunks: counters.chunks,
                heartbeats: counters.heartbeats,
                chars: counters.chars,
                completed,
                failed_attempts,
                elapsed,
            });
        }

        let err = plan.exhausted();
        on_error(&err);
        Err(err)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("backends", &self.backend_ids())
            .field("settings", &self.settings)
            .finish()
    }
}
