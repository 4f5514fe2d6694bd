// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `stanchion` Providers
//!
//! Concrete upstream collaborators and the content data flow.
//!
//! - [`search`] - Content search API: client, normalisation, pagination with
//!   credential rotation, and the live key probe
//! - [`openai`] - OpenAI-compatible chat backend for the orchestrator
//! - [`feed`] - Cache, then live search, then category fallback
//!
//! ## Usage
//!
//! ```ignore
//! use stanchion_providers::{ContentFeed, SearchApiClient, SearchFetcher};
//!
//! let client = SearchApiClient::new(http, base_url);
//! let fetcher = SearchFetcher::new(client, pool);
//! let feed = ContentFeed::new(cache, fetcher);
//!
//! let resolved = feed.resolve("sunscreen").await?;
//! println!("{} ({})", resolved.entry.payload, resolved.origin);
//! ```

pub mod feed;
pub mod openai;
pub mod search;


pub use feed::{ContentFeed, FeedError, FeedOrigin, FeedResult};
pub use openai::OpenAiBackend;
pub use search::{SearchApiClient, SearchError, SearchFetcher, SearchProbe, SearchResult};
