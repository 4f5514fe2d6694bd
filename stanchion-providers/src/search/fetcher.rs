//! Paginated topic search over a credential pool.
//!
//! Each page is requested with the next usable credential. A credential
//! rejection quarantines that key (after enough strikes) and the page is
//! retried with the next one. Transport-class failures are retried with
//! backoff on the same key and never count against it.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use stanchion_core::ContentRecord;
use stanchion_fetch::{CredentialPool, RetryPolicy};

use super::api::{RawNote, SearchApiClient, SearchPage};
use super::error::SearchError;
use super::parser::{normalize_all, render_payload};

/// Default page limit.
pub const DEFAULT_MAX_PAGES: u32 = 3;

// ============================================================================
// Result
// ============================================================================

/// Normalised result of one topic search.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Topic searched for.
    pub topic: String,
    /// Normalised, de-duplicated records.
    pub records: Vec<ContentRecord>,
    /// Pages fetched.
    pub pages: u32,
    /// Raw items received before normalisation.
    pub raw_items: usize,
}

impl SearchResult {
    /// Renders the records as the text payload stored in the cache.
    pub fn payload(&self) -> String {
        render_payload(&self.topic, &self.records)
    }
}

// ============================================================================
// Fetcher
// ============================================================================

/// Topic search with credential rotation and pagination.
#[derive(Debug, Clone)]
pub struct SearchFetcher {
    client: SearchApiClient,
    pool: Arc<CredentialPool>,
    retry: RetryPolicy,
    max_pages: u32,
}

impl SearchFetcher {
    /// Creates a fetcher drawing keys from `pool`.
    pub fn new(client: SearchApiClient, pool: Arc<CredentialPool>) -> Self {
        Self {
            client,
            pool,
            retry: RetryPolicy::default(),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Sets the retry policy for transient failures.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the maximum number of pages per search.
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// The credential pool in use.
    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    /// Searches `topic`, following `has_more` up to the page limit.
    ///
    /// A failure on a later page keeps the pages already fetched.
    ///
    /// # Errors
    ///
    /// Returns the error of the first page if it cannot be fetched.
    #[instrument(skip(self))]
    pub async fn fetch(&self, topic: &str) -> Result<SearchResult, SearchError> {
        let mut raw: Vec<RawNote> = Vec::new();
        let mut pages = 0;

        for page in 1..=self.max_pages {
            let result = match self.fetch_page(topic, page).await {
                Ok(result) => result,
                Err(e) if pages > 0 => {
                    warn!(page, error = %e, "Stopping pagination early");
                    break;
                }
                Err(e) => return Err(e),
            };

            pages += 1;
            let has_more = result.has_more && !result.items.is_empty();
            raw.extend(result.items);
            if !has_more {
                break;
            }
        }

        let records = normalize_all(&raw);
        info!(
            pages,
            raw_items = raw.len(),
            records = records.len(),
            "Search complete"
        );

        Ok(SearchResult {
            topic: topic.to_string(),
            records,
            pages,
            raw_items: raw.len(),
        })
    }

    /// Fetches one page, rotating past rejected credentials.
    ///
    /// A credential is used at most once per page. When the pool hands back
    /// one that was already rejected here, the last rejection is returned.
    async fn fetch_page(&self, topic: &str, page: u32) -> Result<SearchPage, SearchError> {
        let mut tried: HashSet<String> = HashSet::new();
        let mut last_rejection: Option<SearchError> = None;

        loop {
            let Some(credential) = self.pool.next_valid() else {
                return Err(last_rejection
                    .unwrap_or_else(|| SearchError::NoCredentials(self.pool.name().to_string())));
            };

            if !tried.insert(credential.id().to_string()) {
                debug!(credential = credential.id(), "Every usable credential rejected this page");
                return Err(last_rejection
                    .unwrap_or_else(|| SearchError::NoCredentials(self.pool.name().to_string())));
            }

            match self.fetch_with_retry(topic, page, credential.secret()).await {
                Ok(result) => {
                    self.pool.mark_valid(credential.secret());
                    return Ok(result);
                }
                Err(e) if e.is_auth() => {
                    let reason = e.to_string();
                    let quarantined = self.pool.mark_invalid(credential.secret(), &reason);
                    warn!(credential = credential.id(), quarantined, error = %reason, "Credential rejected");
                    last_rejection = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fetches one page with one credential, retrying transient failures.
    async fn fetch_with_retry(
        &self,
        topic: &str,
        page: u32,
        secret: &str,
    ) -> Result<SearchPage, SearchError> {
        let attempts = self.retry.attempts();
        let mut attempt = 0;

        loop {
            match self.client.search_page(topic, page, secret).await {
                Err(e) if e.is_transient() && attempt + 1 < attempts => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    debug!(attempt, delay_ms = delay.as_millis(), error = %e, "Retrying search page");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
