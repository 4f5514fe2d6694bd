//! Streaming output: chunks, heartbeats, and the start-marker gate.

use std::time::Duration;

use super::attempt::AttemptRecord;

/// Withheld prefix size after which an unmatched marker is given up.
pub const MARKER_SEARCH_LIMIT: usize = 8 * 1024;

// ============================================================================
// Stream Chunk
// ============================================================================

/// A piece of streamed output delivered to the consumer.
///
/// A zero-length chunk is a heartbeat: nothing new arrived within the pause
/// threshold, but the stream is still alive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    text: String,
}

impl StreamChunk {
    /// A content chunk.
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// A heartbeat chunk.
    pub fn heartbeat() -> Self {
        Self {
            text: String::new(),
        }
    }

    /// Returns true for heartbeats.
    pub fn is_heartbeat(&self) -> bool {
        self.text.is_empty()
    }

    /// The chunk text (empty for heartbeats).
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Consumes the chunk, returning its text.
    pub fn into_text(self) -> String {
        self.text
    }
}

// ============================================================================
// Marker Gate
// ============================================================================

/// Withholds streamed text until a start marker appears.
///
/// Once the marker is found the gate opens and the first released piece
/// begins exactly at the marker; everything after passes through unchanged.
#[derive(Debug, Clone, Default)]
pub struct MarkerGate {
    marker: Option<String>,
    buffer: String,
    open: bool,
}

impl MarkerGate {
    /// Creates a gate. An empty or absent marker leaves the gate open.
    pub fn new(marker: Option<&str>) -> Self {
        let marker = marker.filter(|m| !m.is_empty()).map(str::to_string);
        Self {
            open: marker.is_none(),
            marker,
            buffer: String::new(),
        }
    }

    /// Returns true once text is passing through.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Feeds one received piece; returns the text to release, if any.
    pub fn push(&mut self, text: &str) -> Option<String> {
        if self.open {
            return (!text.is_empty()).then(|| text.to_string());
        }

        self.buffer.push_str(text);

        let found = self
            .marker
            .as_deref()
            .and_then(|marker| self.buffer.find(marker));

        if let Some(pos) = found {
            self.open = true;
            let released = self.buffer.split_off(pos);
            self.buffer.clear();
            return Some(released);
        }

        if self.buffer.len() > MARKER_SEARCH_LIMIT {
            self.open = true;
            return Some(std::mem::take(&mut self.buffer));
        }

        None
    }

    /// Releases any withheld text at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        self.open = true;
        Some(std::mem::take(&mut self.buffer))
    }
}

// ============================================================================
// Stream Summary
// ============================================================================

/// Result of a streamed request.
#[derive(Debug, Clone)]
pub struct StreamSummary {
    /// Backend that produced the stream.
    pub backend_id: String,
    /// Non-empty chunks delivered.
    pub chunks: usize,
    /// Heartbeats delivered.
    pub heartbeats: usize,
    /// Characters delivered.
    pub chars: usize,
    /// False if the stream broke after content had been delivered.
    pub completed: bool,
    /// Failed attempts made before this stream.
    pub failed_attempts: Vec<AttemptRecord>,
    /// Time spent across all attempts.
    pub elapsed: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_marker_passes_through() {
        let mut gate = MarkerGate::new(None);
        assert!(gate.is_open());
        assert_eq!(gate.push("abc"), Some("abc".to_string()));
        assert_eq!(gate.push(""), None);
        assert_eq!(gate.finish(), None);
    }

    #[test]
    fn test_marker_spanning_two_chunks() {
        let mut gate = MarkerGate::new(Some("# Title"));
        assert_eq!(gate.push("Sure! Here is the draft.\n# Ti"), None);
        assert_eq!(gate.push("tle\nBody"), Some("# Title\nBody".to_string()));
        assert_eq!(gate.push(" more"), Some(" more".to_string()));
    }

    #[test]
    fn test_marker_within_one_chunk() {
        let mut gate = MarkerGate::new(Some("<<"));
        assert_eq!(gate.push("xx<<yy"), Some("<<yy".to_string()));
    }

    #[test]
    fn test_missing_marker_flushed_at_end() {
        let mut gate = MarkerGate::new(Some("#"));
        assert_eq!(gate.push("plain "), None);
        assert_eq!(gate.push("text"), None);
        assert_eq!(gate.finish(), Some("plain text".to_string()));
    }

    #[test]
    fn test_missing_marker_released_after_limit() {
        let mut gate = MarkerGate::new(Some("#"));
        let big = "a".repeat(MARKER_SEARCH_LIMIT + 1);
        assert_eq!(gate.push(&big).map(|s| s.len()), Some(MARKER_SEARCH_LIMIT + 1));
        assert!(gate.is_open());
        assert_eq!(gate.push("b"), Some("b".to_string()));
    }

    #[test]
    fn test_heartbeat_chunk() {
        assert!(StreamChunk::heartbeat().is_heartbeat());
        assert!(!StreamChunk::text("x").is_heartbeat());
    }
}
