//! Orchestrator timing and retry settings.

use std::time::Duration;

use crate::budget::Deadline;
use crate::retry::RetryPolicy;

/// Default per-request cap.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Default per-stream cap.
pub const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(120);

/// Default overall deadline budget.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(150);

/// Default safety margin.
pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_secs(5);

/// Default stream pause threshold.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_millis(500);

/// Settings shared by every orchestrated request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrchestratorSettings {
    /// Retries per backend and the backoff between them.
    pub retry: RetryPolicy,
    /// Cap on a single structured call.
    pub request_timeout: Duration,
    /// Cap on a single streamed call.
    pub stream_timeout: Duration,
    /// Overall budget used by [`OrchestratorSettings::start_deadline`].
    pub deadline: Duration,
    /// No attempt starts once the remaining budget is at or below this.
    pub safety_margin: Duration,
    /// Silence after which a heartbeat chunk is emitted.
    pub heartbeat: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
            deadline: DEFAULT_DEADLINE,
            safety_margin: DEFAULT_SAFETY_MARGIN,
            heartbeat: DEFAULT_HEARTBEAT,
        }
    }
}

impl OrchestratorSettings {
    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the per-request and per-stream caps.
    pub fn with_timeouts(mut self, request: Duration, stream: Duration) -> Self {
        self.request_timeout = request;
        self.stream_timeout = stream;
        self
    }

    /// Sets the overall budget and safety margin.
    pub fn with_deadline(mut self, deadline: Duration, safety_margin: Duration) -> Self {
        self.deadline = deadline;
        self.safety_margin = safety_margin;
        self
    }

    /// Sets the heartbeat threshold.
    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Starts a deadline with the configured budget.
    pub fn start_deadline(&self) -> Deadline {
        Deadline::new(self.deadline)
    }
}
