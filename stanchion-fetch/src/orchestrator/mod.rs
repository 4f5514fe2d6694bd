//! Request orchestration across generation backends.
//!
//! The orchestrator is independent of the credential pool and the cache: it
//! only knows an ordered list of [`ChatBackend`]s and the timing settings.

mod attempt;
mod backend;
mod pipeline;
mod schema;
mod settings;
mod stream;

pub use attempt::{AttemptRecord, BackendAttempt, ExhaustionReport, FailureKind};
pub use backend::{ChatBackend, ChunkStream, Prompt};
pub use pipeline::Orchestrator;
pub use schema::{ResponseSchema, StructuredResponse, extract_json};
pub use settings::{
    DEFAULT_DEADLINE, DEFAULT_HEARTBEAT, DEFAULT_REQUEST_TIMEOUT, DEFAULT_SAFETY_MARGIN,
    DEFAULT_STREAM_TIMEOUT, OrchestratorSettings,
};
pub use stream::{MARKER_SEARCH_LIMIT, MarkerGate, StreamChunk, StreamSummary};
