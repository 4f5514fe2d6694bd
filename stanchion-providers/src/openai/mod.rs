//! OpenAI-compatible chat completion backend.
//!
//! - [`api`] - [`OpenAiBackend`], one instance per configured model
//! - [`sse`] - Incremental decoding of streamed deltas

pub mod api;
pub mod sse;

pub use api::{API_BASE_URL, OpenAiBackend};
