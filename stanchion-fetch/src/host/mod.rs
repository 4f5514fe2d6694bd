//! Host APIs for stanchion.
//!
//! - [`http`] - HTTP client with tracing, per-call timeouts and domain allowlist

pub mod http;

pub use http::HttpClient;
