//! Service construction.
//!
//! Services are built once per invocation in a fixed order: credential
//! pools and the cache first, then the search fetcher and feed on top of
//! them, then the orchestrator, which depends on neither.

use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use stanchion_fetch::{ChatBackend, CredentialPool, HttpClient, Orchestrator};
use stanchion_providers::{ContentFeed, OpenAiBackend, SearchApiClient, SearchFetcher, SearchProbe};
use stanchion_store::{AppConfig, TieredCache};

/// Pool name for search keys.
pub const SEARCH_POOL: &str = "search";

/// Pool name for detail keys.
pub const DETAIL_POOL: &str = "detail";

/// Every long-lived service of one invocation.
pub struct Services {
    /// Configuration the services were built from.
    pub config: AppConfig,
    /// Search API keys.
    pub search_pool: Arc<CredentialPool>,
    /// Detail API keys (the search keys when none are configured).
    pub detail_pool: Arc<CredentialPool>,
    /// Result cache.
    pub cache: Arc<TieredCache>,
    /// Cache, then live search, then fallback.
    pub feed: ContentFeed,
    /// Chat backend failover.
    pub orchestrator: Orchestrator,
    search_client: SearchApiClient,
}

impl Services {
    /// Builds every service from `config`.
    pub fn build(config: AppConfig) -> Result<Self> {
        let http = HttpClient::new()?.with_allowed_base_urls([
            config.search.base_url.as_str(),
            config.llm.base_url.as_str(),
        ])?;

        let pool_settings = config.pool_settings();
        let search_pool = Arc::new(CredentialPool::load(
            SEARCH_POOL,
            config.search.api_keys.iter().cloned(),
            pool_settings,
        ));
        let detail_pool = Arc::new(CredentialPool::load(
            DETAIL_POOL,
            config.detail_secrets().iter().cloned(),
            pool_settings,
        ));
        let cache = Arc::new(TieredCache::new(config.cache_dir(), config.cache_ttl()));

        let search_client = SearchApiClient::new(http.clone(), config.search.base_url.as_str())
            .with_page_size(config.search.page_size);
        let fetcher = SearchFetcher::new(search_client.clone(), Arc::clone(&search_pool))
            .with_retry(config.retry_policy())
            .with_max_pages(config.search.max_pages);
        let feed = ContentFeed::new(Arc::clone(&cache), fetcher);

        let backends: Vec<Arc<dyn ChatBackend>> = config
            .llm
            .models
            .iter()
            .map(|model| {
                let mut backend = OpenAiBackend::new(http.clone(), config.llm.base_url.as_str(), model.as_str());
                if let Some(key) = &config.llm.api_key {
                    backend = backend.with_api_key(key.as_str());
                }
                Arc::new(backend) as Arc<dyn ChatBackend>
            })
            .collect();
        let orchestrator = Orchestrator::new(backends, config.orchestrator_settings());

        debug!(
            search_keys = search_pool.len(),
            detail_keys = detail_pool.len(),
            models = config.llm.models.len(),
            "Services ready"
        );

        Ok(Self {
            config,
            search_pool,
            detail_pool,
            cache,
            feed,
            orchestrator,
            search_client,
        })
    }

    /// Whether the detail pool has its own keys.
    pub fn has_own_detail_keys(&self) -> bool {
        !self.config.search.detail_api_keys.is_empty()
    }

    /// A live probe against the search API.
    pub fn search_probe(&self) -> SearchProbe {
        SearchProbe::new(self.search_client.clone())
    }
}
