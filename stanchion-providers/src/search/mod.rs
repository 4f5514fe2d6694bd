//! Content search API.
//!
//! - [`api`] - HTTP client and wire types
//! - [`parser`] - Normalisation of raw items into [`stanchion_core::ContentRecord`]
//! - [`fetcher`] - Pagination and credential rotation
//! - [`probe`] - Live key validation

pub mod api;
pub mod error;
pub mod fetcher;
pub mod parser;
pub mod probe;

pub use api::{API_BASE_URL, SEARCH_ENDPOINT, SearchApiClient};
pub use error::SearchError;
pub use fetcher::{SearchFetcher, SearchResult};
pub use probe::SearchProbe;
