// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Stanchion Fetch
//!
//! Resilience plumbing for talking to unreliable upstreams.
//!
//! ## Credential Pool
//!
//! - [`credentials::CredentialPool`] - Round-robin secrets with quarantine
//!   and lazy cooldown reinstatement
//! - [`credentials::CredentialProbe`] - Live probe used by `validate`
//!
//! ## Host APIs
//!
//! - [`host::http`] - HTTP client with tracing and domain allowlist
//!
//! ## Request Orchestrator
//!
//! - [`orchestrator::Orchestrator`] - Backend failover with retry, backoff
//!   and a shared [`budget::Deadline`]
//! - [`orchestrator::ResponseSchema`] - Shape validation for structured calls
//!
//! ## Example
//!
//! ```ignore
//! use stanchion_fetch::{Orchestrator, OrchestratorSettings, Prompt, ResponseSchema};
//!
//! let orchestrator = Orchestrator::new(backends, OrchestratorSettings::default());
//! let schema = ResponseSchema::new().require("title").require_non_empty("sections");
//!
//! let response = orchestrator
//!     .request_structured(&Prompt::new("...").json(), &schema, orchestrator.start_deadline())
//!     .await?;
//! println!("answered by {}", response.backend_id);
//! ```

pub mod budget;
pub mod credentials;
pub mod error;
pub mod host;
pub mod orchestrator;
pub mod retry;

// Re-export key types at crate root

// Errors
pub use error::{BackendError, HttpError, OrchestratorError, ValidationError};

// Credentials
pub use credentials::{
    Credential, CredentialPool, CredentialProbe, CredentialStatus, PoolSettings, ProbeVerdict,
    ValidationReport,
};

// Host APIs
pub use host::HttpClient;

// Orchestration
pub use budget::Deadline;
pub use orchestrator::{
    AttemptRecord, ChatBackend, ChunkStream, ExhaustionReport, FailureKind, Orchestrator,
    OrchestratorSettings, Prompt, ResponseSchema, StreamChunk, StreamSummary, StructuredResponse,
};
pub use retry::{Backoff, RetryPolicy};
