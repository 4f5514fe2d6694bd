//! OpenAI-compatible chat completion backend.
//!
//! # API Endpoint
//!
//! ```text
//! POST {base_url}/chat/completions
//! Authorization: Bearer <api_key>
//! ```
//!
//! # Request Format
//!
//! ```json
//! {
//!   "model": "gpt-4o-mini",
//!   "messages": [{"role": "system", "content": "..."}, {"role": "user", "content": "..."}],
//!   "temperature": 0.7,
//!   "response_format": {"type": "json_object"},
//!   "stream": false
//! }
//! ```

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use stanchion_fetch::host::http::truncate_body;
use stanchion_fetch::{BackendError, ChatBackend, ChunkStream, HttpClient, HttpError, Prompt};

use super::sse::{SseDecoder, SseEvent};

// ============================================================================
// Constants
// ============================================================================

/// Default base URL.
pub const API_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat completions endpoint.
pub const COMPLETIONS_ENDPOINT: &str = "/chat/completions";

/// Body characters kept in error messages.
const ERROR_BODY_CHARS: usize = 300;

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Non-streaming response.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// ============================================================================
// Backend
// ============================================================================

/// One model served by an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiBackend {
    /// Creates a backend for `model` at `base_url`.
    pub fn new(http: HttpClient, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            model: model.into(),
        }
    }

    /// Sets the bearer token.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn completions_url(&self) -> String {
        format!("{}{}", self.base_url, COMPLETIONS_ENDPOINT)
    }

    fn build_request<'a>(&'a self, prompt: &'a Prompt, stream: bool) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = prompt.system.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &prompt.user,
        });

        ChatRequest {
            model: &self.model,
            messages,
            temperature: prompt.temperature,
            response_format: prompt.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
            stream,
        }
    }

    async fn send(
        &self,
        prompt: &Prompt,
        stream: bool,
        timeout: Duration,
    ) -> Result<reqwest::Response, BackendError> {
        let body = self.build_request(prompt, stream);
        let response = self
            .http
            .post_json_with_auth(&self.completions_url(), &body, self.api_key.as_deref(), timeout)
            .await
            .map_err(|e| BackendError::from_http(e, timeout))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(model = %self.model, status = %status, "Chat request failed");
        Err(BackendError::Status {
            status: status.as_u16(),
            body: truncate_body(&body, ERROR_BODY_CHARS),
        })
    }
}

/// Read state of an open completion stream.
struct StreamState {
    bytes: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, BackendError>>,
    done: bool,
}

impl StreamState {
    fn absorb(&mut self, event: SseEvent) {
        match event {
            SseEvent::Delta(text) if text.is_empty() => {}
            SseEvent::Delta(text) => self.pending.push_back(Ok(text)),
            SseEvent::Error(message) => {
                self.pending.push_back(Err(BackendError::Stream(message)));
                self.done = true;
            }
            SseEvent::Done => self.done = true,
        }
    }

    async fn next_item(mut self) -> Option<(Result<String, BackendError>, Self)> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some((item, self));
            }
            if self.done {
                return None;
            }

            match self.bytes.next().await {
                Some(Ok(chunk)) => {
                    for event in self.decoder.feed(&chunk) {
                        self.absorb(event);
                        if self.done {
                            break;
                        }
                    }
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some((Err(BackendError::Stream(e.to_string())), self));
                }
                None => {
                    if let Some(event) = self.decoder.finish() {
                        self.absorb(event);
                    }
                    self.done = true;
                }
            }
        }
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    fn id(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn complete(&self, prompt: &Prompt, timeout: Duration) -> Result<String, BackendError> {
        let response = self.send(prompt, false, timeout).await?;

        let body = response
            .text()
            .await
            .map_err(|e| BackendError::from_http(HttpError::from_reqwest(e), timeout))?;
        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| BackendError::Malformed(format!("Failed to parse completion: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .ok_or_else(|| BackendError::Malformed("completion has no message content".into()))?;

        debug!(chars = content.chars().count(), "Completion received");
        Ok(content)
    }

    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn open_stream(
        &self,
        prompt: &Prompt,
        timeout: Duration,
    ) -> Result<ChunkStream, BackendError> {
        let response = self.send(prompt, true, timeout).await?;
        debug!("Completion stream opened");

        let state = StreamState {
            bytes: response.bytes_stream().map(|r| r.map(|b| b.to_vec())).boxed(),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            done: false,
        };

        Ok(stream::unfold(state, StreamState::next_item).boxed())
    }
}
