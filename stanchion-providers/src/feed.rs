//! Topic content resolution: cache, then live search, then category fallback.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use stanchion_core::{CacheEntry, CacheSource};
use stanchion_store::TieredCache;

use crate::search::{SearchError, SearchFetcher};

// ============================================================================
// Result Types
// ============================================================================

/// Where resolved content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedOrigin {
    /// A fresh cache entry for the exact topic.
    Cache,
    /// A live search that just ran.
    Fetched,
    /// A same-category entry repurposed after the live search failed.
    Fallback,
}

impl fmt::Display for FeedOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cache => "cache",
            Self::Fetched => "fetched",
            Self::Fallback => "fallback",
        })
    }
}

/// Resolved content for one topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResult {
    /// Where the entry came from.
    pub origin: FeedOrigin,
    /// The content.
    pub entry: CacheEntry,
}

/// Content could not be resolved.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The live search failed and no fallback exists.
    #[error("No content available for {topic:?}: {source}")]
    Unavailable {
        /// Requested topic.
        topic: String,
        /// The search failure.
        #[source]
        source: SearchError,
    },
}

impl FeedError {
    /// The underlying search failure.
    pub fn search_error(&self) -> &SearchError {
        match self {
            Self::Unavailable { source, .. } => source,
        }
    }
}

// ============================================================================
// Feed
// ============================================================================

/// Resolves topic content through the tiered cache.
#[derive(Debug, Clone)]
pub struct ContentFeed {
    cache: Arc<TieredCache>,
    fetcher: SearchFetcher,
}

impl ContentFeed {
    /// Creates a feed over `cache` and `fetcher`.
    pub fn new(cache: Arc<TieredCache>, fetcher: SearchFetcher) -> Self {
        Self { cache, fetcher }
    }

    /// The cache in use.
    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    /// Resolves content for `topic`.
    pub async fn resolve(&self, topic: &str) -> Result<FeedResult, FeedError> {
        self.resolve_at(topic, Utc::now()).await
    }

    /// Resolves content for `topic` as of `now`.
    ///
    /// A search that returns no records is passed through without being
    /// cached. A failed cache write is logged and does not fail the call.
    #[instrument(skip(self, now))]
    pub async fn resolve_at(
        &self,
        topic: &str,
        now: DateTime<Utc>,
    ) -> Result<FeedResult, FeedError> {
        if let Some(entry) = self.cache.get_at(topic, now).await {
            return Ok(FeedResult {
                origin: FeedOrigin::Cache,
                entry,
            });
        }

        match self.fetcher.fetch(topic).await {
            Ok(result) => {
                let payload = result.payload();

                if result.records.is_empty() {
                    info!("Search returned no records, not caching");
                    let entry =
                        CacheEntry::new_at(topic, payload, Vec::new(), CacheSource::Fetched, now);
                    return Ok(FeedResult {
                        origin: FeedOrigin::Fetched,
                        entry,
                    });
                }

                let entry = match self
                    .cache
                    .put_at(topic, payload.clone(), result.records.clone(), CacheSource::Fetched, now)
                    .await
                {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(error = %e, "Failed to cache search result");
                        CacheEntry::new_at(topic, payload, result.records, CacheSource::Fetched, now)
                    }
                };

                Ok(FeedResult {
                    origin: FeedOrigin::Fetched,
                    entry,
                })
            }
            Err(e) => {
                warn!(error = %e, "Live search failed, looking for a fallback");
                match self.cache.get_fallback_at(topic, now).await {
                    Some(entry) => Ok(FeedResult {
                        origin: FeedOrigin::Fallback,
                        entry,
                    }),
                    None => Err(FeedError::Unavailable {
                        topic: topic.to_string(),
                        source: e,
                    }),
                }
            }
        }
    }
}
