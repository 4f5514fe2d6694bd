//! Server-sent events decoding for streamed chat completions.
//!
//! The upstream sends one `data: {json}` line per delta and terminates with
//! `data: [DONE]`. Network chunks can split lines (and UTF-8 sequences)
//! anywhere, so bytes are buffered until a full line is available.

use serde::Deserialize;
use tracing::debug;

/// A decoded stream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A content delta.
    Delta(String),
    /// The upstream reported an error inside the stream.
    Error(String),
    /// The terminating `[DONE]` sentinel.
    Done,
}

#[derive(Debug, Deserialize)]
struct StreamPayload {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<StreamErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Incremental line decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw bytes and returns every event completed by them.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(event) = decode_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Decodes whatever is left once the byte stream ends.
    pub fn finish(&mut self) -> Option<SseEvent> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        decode_line(&line)
    }
}

fn decode_line(line: &[u8]) -> Option<SseEvent> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\r', '\n']);

    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }

    let payload: StreamPayload = match serde_json::from_str(data) {
        Ok(payload) => payload,
        Err(e) => {
            debug!(error = %e, "Skipping undecodable stream line");
            return None;
        }
    };

    if let Some(error) = payload.error {
        return Some(SseEvent::Error(
            error.message.unwrap_or_else(|| "unknown stream error".to_string()),
        ));
    }

    let text = payload
        .choices
        .into_iter()
        .filter_map(|choice| choice.delta.and_then(|d| d.content))
        .collect::<String>();
    Some(SseEvent::Delta(text))
}
