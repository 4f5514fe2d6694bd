//! Generation backend abstraction.

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::time::Duration;

use crate::error::BackendError;

/// A chat prompt handed to a backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prompt {
    /// Optional system message.
    pub system: Option<String>,
    /// User message.
    pub user: String,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Ask the backend for a JSON object response.
    pub json_mode: bool,
}

impl Prompt {
    /// Creates a prompt from a user message.
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ..Self::default()
        }
    }

    /// Sets the system message.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Sets the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Requests JSON object output.
    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// Stream of text deltas from a backend.
pub type ChunkStream = BoxStream<'static, Result<String, BackendError>>;

/// One configured generation backend.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Backend identifier (usually the model id).
    fn id(&self) -> &str;

    /// Issues a single non-streaming call.
    async fn complete(&self, prompt: &Prompt, timeout: Duration) -> Result<String, BackendError>;

    /// Opens a streaming call. The orchestrator enforces `timeout` over the
    /// whole stream; backends only need to honour it while connecting.
    async fn open_stream(
        &self,
        prompt: &Prompt,
        timeout: Duration,
    ) -> Result<ChunkStream, BackendError>;
}
