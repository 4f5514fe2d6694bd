//! Runtime configuration.
//!
//! Layers, lowest to highest precedence: compiled defaults, an optional JSON
//! file, then environment variables. Environment access goes through a
//! lookup function so the layering can be exercised without touching the
//! process environment.

use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use stanchion_fetch::{Backoff, OrchestratorSettings, PoolSettings, RetryPolicy};

use crate::cache::DEFAULT_TTL_SECS;
use crate::error::StoreError;
use crate::persistence::{default_cache_dir, default_config_path};

/// Environment variable names.
pub mod vars {
    /// Search pool secret prefix (`SEARCH_API_KEY_1`, ...).
    pub const SEARCH_API_KEY: &str = "SEARCH_API_KEY";
    /// Detail pool secret prefix.
    pub const DETAIL_API_KEY: &str = "DETAIL_API_KEY";
    /// Search API base URL.
    pub const SEARCH_API_BASE_URL: &str = "SEARCH_API_BASE_URL";
    /// Comma-separated backend model ids.
    pub const LLM_MODELS: &str = "LLM_MODELS";
    /// Chat API base URL.
    pub const LLM_BASE_URL: &str = "LLM_BASE_URL";
    /// Chat API bearer token.
    pub const LLM_API_KEY: &str = "LLM_API_KEY";
    /// Preferred cache directory.
    pub const CACHE_DIR: &str = "STANCHION_CACHE_DIR";
    /// Cache TTL in seconds.
    pub const CACHE_TTL_SECS: &str = "STANCHION_CACHE_TTL_SECS";
    /// Consecutive failures before quarantine.
    pub const MAX_FAILURES: &str = "STANCHION_MAX_FAILURES";
    /// Quarantine cooldown in seconds.
    pub const COOLDOWN_SECS: &str = "STANCHION_COOLDOWN_SECS";
    /// Retries per backend.
    pub const MAX_RETRIES: &str = "STANCHION_MAX_RETRIES";
    /// First backoff delay in milliseconds.
    pub const BACKOFF_BASE_MS: &str = "STANCHION_BACKOFF_BASE_MS";
    /// Backoff cap in milliseconds.
    pub const BACKOFF_CAP_MS: &str = "STANCHION_BACKOFF_CAP_MS";
    /// Backoff growth factor.
    pub const BACKOFF_MULTIPLIER: &str = "STANCHION_BACKOFF_MULTIPLIER";
    /// Per-request cap in seconds.
    pub const REQUEST_TIMEOUT_SECS: &str = "STANCHION_REQUEST_TIMEOUT_SECS";
    /// Per-stream cap in seconds.
    pub const STREAM_TIMEOUT_SECS: &str = "STANCHION_STREAM_TIMEOUT_SECS";
    /// Overall deadline budget in seconds.
    pub const DEADLINE_SECS: &str = "STANCHION_DEADLINE_SECS";
    /// Safety margin in seconds.
    pub const SAFETY_MARGIN_SECS: &str = "STANCHION_SAFETY_MARGIN_SECS";
    /// Stream pause threshold in milliseconds.
    pub const HEARTBEAT_MS: &str = "STANCHION_HEARTBEAT_MS";
}

// ============================================================================
// Sections
// ============================================================================

/// Search API settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Base URL of the search API.
    pub base_url: String,
    /// Secrets for the search pool.
    #[serde(skip_serializing)]
    pub api_keys: Vec<String>,
    /// Secrets for the detail pool (empty = reuse the search pool's).
    #[serde(skip_serializing)]
    pub detail_api_keys: Vec<String>,
    /// Items requested per page.
    pub page_size: u32,
    /// Pages followed per fetch.
    pub max_pages: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.example-notes.com".to_string(),
            api_keys: Vec::new(),
            detail_api_keys: Vec::new(),
            page_size: 20,
            max_pages: 3,
        }
    }
}

impl fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchConfig")
            .field("base_url", &self.base_url)
            .field("api_keys", &self.api_keys.len())
            .field("detail_api_keys", &self.detail_api_keys.len())
            .field("page_size", &self.page_size)
            .field("max_pages", &self.max_pages)
            .finish()
    }
}

/// Chat backend settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL.
    pub base_url: String,
    /// Bearer token.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Model ids, highest priority first.
    pub models: Vec<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            models: vec!["gpt-4o-mini".to_string()],
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<set>"))
            .field("models", &self.models)
            .finish()
    }
}

/// Cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Preferred cache directory (platform cache dir when unset).
    pub dir: Option<PathBuf>,
    /// Time-to-live in seconds.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            ttl_secs: DEFAULT_TTL_SECS.unsigned_abs(),
        }
    }
}

/// Credential pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Consecutive failures before quarantine.
    pub max_failures: u32,
    /// Quarantine cooldown in seconds.
    pub cooldown_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_failures: 3,
            cooldown_secs: 600,
        }
    }
}

/// Orchestrator timing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Retries per backend.
    pub max_retries: u32,
    /// First backoff delay in milliseconds.
    pub backoff_base_ms: u64,
    /// Backoff cap in milliseconds.
    pub backoff_cap_ms: u64,
    /// Backoff growth factor.
    pub backoff_multiplier: f64,
    /// Per-request cap in seconds.
    pub request_timeout_secs: u64,
    /// Per-stream cap in seconds.
    pub stream_timeout_secs: u64,
    /// Overall deadline budget in seconds.
    pub deadline_secs: u64,
    /// Safety margin in seconds.
    pub safety_margin_secs: u64,
    /// Stream pause threshold in milliseconds.
    pub heartbeat_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base_ms: 1000,
            backoff_cap_ms: 8000,
            backoff_multiplier: 2.0,
            request_timeout_secs: 60,
            stream_timeout_secs: 120,
            deadline_secs: 150,
            safety_margin_secs: 5,
            heartbeat_ms: 500,
        }
    }
}

// ============================================================================
// App Config
// ============================================================================

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Search API.
    pub search: SearchConfig,
    /// Chat backends.
    pub llm: LlmConfig,
    /// Result cache.
    pub cache: CacheConfig,
    /// Credential pools.
    pub pool: PoolConfig,
    /// Request orchestrator.
    pub orchestrator: OrchestratorConfig,
}

impl AppConfig {
    /// Loads defaults, the config file and the process environment.
    ///
    /// With `path = None` the default file is used if it exists. An explicit
    /// path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, StoreError> {
        let mut config = match path {
            Some(path) => Self::load_file(path)?,
            None => {
                let default = default_config_path();
                if default.exists() {
                    Self::load_file(&default)?
                } else {
                    debug!(path = %default.display(), "Config file not found, using defaults");
                    Self::default()
                }
            }
        };

        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a JSON file.
    pub fn load_file(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: AppConfig = serde_json::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Builds a configuration from defaults and an environment lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Overrides values from an environment lookup.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] naming the variable on malformed input.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), StoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let search_keys = numbered_secrets(vars::SEARCH_API_KEY, &lookup);
        if !search_keys.is_empty() {
            self.search.api_keys = search_keys;
        }
        let detail_keys = numbered_secrets(vars::DETAIL_API_KEY, &lookup);
        if !detail_keys.is_empty() {
            self.search.detail_api_keys = detail_keys;
        }
        if let Some(url) = non_empty(&lookup, vars::SEARCH_API_BASE_URL) {
            self.search.base_url = url;
        }

        if let Some(models) = non_empty(&lookup, vars::LLM_MODELS) {
            self.llm.models = parse_list(&models);
        }
        if let Some(url) = non_empty(&lookup, vars::LLM_BASE_URL) {
            self.llm.base_url = url;
        }
        if let Some(key) = non_empty(&lookup, vars::LLM_API_KEY) {
            self.llm.api_key = Some(key);
        }

        if let Some(dir) = non_empty(&lookup, vars::CACHE_DIR) {
            self.cache.dir = Some(PathBuf::from(dir));
        }
        set_parsed(&lookup, vars::CACHE_TTL_SECS, &mut self.cache.ttl_secs)?;

        set_parsed(&lookup, vars::MAX_FAILURES, &mut self.pool.max_failures)?;
        set_parsed(&lookup, vars::COOLDOWN_SECS, &mut self.pool.cooldown_secs)?;

        let o = &mut self.orchestrator;
        set_parsed(&lookup, vars::MAX_RETRIES, &mut o.max_retries)?;
        set_parsed(&lookup, vars::BACKOFF_BASE_MS, &mut o.backoff_base_ms)?;
        set_parsed(&lookup, vars::BACKOFF_CAP_MS, &mut o.backoff_cap_ms)?;
        set_parsed(&lookup, vars::BACKOFF_MULTIPLIER, &mut o.backoff_multiplier)?;
        set_parsed(&lookup, vars::REQUEST_TIMEOUT_SECS, &mut o.request_timeout_secs)?;
        set_parsed(&lookup, vars::STREAM_TIMEOUT_SECS, &mut o.stream_timeout_secs)?;
        set_parsed(&lookup, vars::DEADLINE_SECS, &mut o.deadline_secs)?;
        set_parsed(&lookup, vars::SAFETY_MARGIN_SECS, &mut o.safety_margin_secs)?;
        set_parsed(&lookup, vars::HEARTBEAT_MS, &mut o.heartbeat_ms)?;

        Ok(())
    }

    /// Rejects values that would make the services misbehave.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.pool.max_failures == 0 {
            return Err(StoreError::Config("pool.max_failures must be at least 1".to_string()));
        }
        let multiplier = self.orchestrator.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(StoreError::Config(format!(
                "orchestrator.backoff_multiplier must be >= 1.0, got {multiplier}"
            )));
        }
        if self.orchestrator.heartbeat_ms == 0 {
            return Err(StoreError::Config("orchestrator.heartbeat_ms must be positive".to_string()));
        }
        if self.cache.ttl_secs == 0 {
            return Err(StoreError::Config("cache.ttl_secs must be positive".to_string()));
        }
        if seconds(self.cache.ttl_secs).is_none() {
            return Err(StoreError::Config(format!(
                "cache.ttl_secs is out of range: {}",
                self.cache.ttl_secs
            )));
        }
        if seconds(self.pool.cooldown_secs).is_none() {
            return Err(StoreError::Config(format!(
                "pool.cooldown_secs is out of range: {}",
                self.pool.cooldown_secs
            )));
        }
        Ok(())
    }

    /// Secrets for the detail pool, falling back to the search pool's.
    pub fn detail_secrets(&self) -> &[String] {
        if self.search.detail_api_keys.is_empty() {
            &self.search.api_keys
        } else {
            &self.search.detail_api_keys
        }
    }

    /// Preferred cache directory.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache.dir.clone().unwrap_or_else(default_cache_dir)
    }

    /// Cache time-to-live.
    ///
    /// Saturates at the largest representable span if `validate` was skipped.
    pub fn cache_ttl(&self) -> ChronoDuration {
        seconds(self.cache.ttl_secs).unwrap_or(ChronoDuration::MAX)
    }

    /// Credential pool thresholds.
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_failures: self.pool.max_failures,
            cooldown: seconds(self.pool.cooldown_secs).unwrap_or(ChronoDuration::MAX),
        }
    }

    /// Retry policy shared by the orchestrator and the search fetcher.
    pub fn retry_policy(&self) -> RetryPolicy {
        let o = &self.orchestrator;
        RetryPolicy::new(o.max_retries).with_backoff(Backoff::new(
            Duration::from_millis(o.backoff_base_ms),
            o.backoff_multiplier,
            Duration::from_millis(o.backoff_cap_ms),
        ))
    }

    /// Orchestrator settings.
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        let o = &self.orchestrator;
        OrchestratorSettings::default()
            .with_retry(self.retry_policy())
            .with_timeouts(
                Duration::from_secs(o.request_timeout_secs),
                Duration::from_secs(o.stream_timeout_secs),
            )
            .with_deadline(
                Duration::from_secs(o.deadline_secs),
                Duration::from_secs(o.safety_margin_secs),
            )
            .with_heartbeat(Duration::from_millis(o.heartbeat_ms))
    }
}

// ============================================================================
// Environment helpers
// ============================================================================

/// Converts seconds to a chrono span, `None` when out of range.
fn seconds(secs: u64) -> Option<ChronoDuration> {
    i64::try_from(secs).ok().and_then(ChronoDuration::try_seconds)
}

fn non_empty<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn set_parsed<F, T>(lookup: &F, name: &str, target: &mut T) -> Result<(), StoreError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = non_empty(lookup, name) {
        *target = raw
            .parse()
            .map_err(|_| StoreError::malformed(name, &raw, std::any::type_name::<T>()))?;
    }
    Ok(())
}

fn parse_list(raw: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !items.iter().any(|existing| existing == item) {
            items.push(item.to_string());
        }
    }
    items
}

/// Reads `PREFIX_1`, `PREFIX_2`, ... up to the first gap, then `PREFIX`.
///
/// Empty values are ignored and duplicates keep their first position.
pub fn numbered_secrets<F>(prefix: &str, lookup: &F) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut secrets: Vec<String> = Vec::new();
    let mut push = |value: String| {
        if !secrets.contains(&value) {
            secrets.push(value);
        }
    };

    for index in 1.. {
        let Some(raw) = lookup(&format!("{prefix}_{index}")) else {
            break;
        };
        let value = raw.trim();
        if !value.is_empty() {
            push(value.to_string());
        }
    }

    if let Some(value) = non_empty(lookup, prefix) {
        push(value);
    }

    secrets
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(env(&[])).unwrap();
        assert!(config.search.api_keys.is_empty());
        assert_eq!(config.llm.models, vec!["gpt-4o-mini"]);
        assert_eq!(config.cache.ttl_secs, 21_600);
        assert_eq!(config.pool_settings().max_failures, 3);
        assert_eq!(config.pool_settings().cooldown, ChronoDuration::minutes(10));

        let settings = config.orchestrator_settings();
        assert_eq!(settings.retry.attempts(), 3);
        assert_eq!(settings.safety_margin, Duration::from_secs(5));
        assert_eq!(settings.heartbeat, Duration::from_millis(500));
    }

    #[test]
    fn test_numbered_secrets_stop_at_gap() {
        let lookup = env(&[
            ("SEARCH_API_KEY_1", "a"),
            ("SEARCH_API_KEY_2", " b "),
            ("SEARCH_API_KEY_4", "d"),
            ("SEARCH_API_KEY", "z"),
        ]);
        assert_eq!(numbered_secrets("SEARCH_API_KEY", &lookup), vec!["a", "b", "z"]);
    }

    #[test]
    fn test_numbered_secrets_skip_empty_and_duplicates() {
        let lookup = env(&[
            ("SEARCH_API_KEY_1", "a"),
            ("SEARCH_API_KEY_2", ""),
            ("SEARCH_API_KEY_3", "a"),
            ("SEARCH_API_KEY", "a"),
        ]);
        assert_eq!(numbered_secrets("SEARCH_API_KEY", &lookup), vec!["a"]);
    }

    #[test]
    fn test_single_unnumbered_secret() {
        let config = AppConfig::from_lookup(env(&[("SEARCH_API_KEY", "only")])).unwrap();
        assert_eq!(config.search.api_keys, vec!["only"]);
    }

    #[test]
    fn test_detail_pool_falls_back_to_search() {
        let config = AppConfig::from_lookup(env(&[("SEARCH_API_KEY_1", "s1")])).unwrap();
        assert_eq!(config.detail_secrets(), ["s1"]);

        let config = AppConfig::from_lookup(env(&[
            ("SEARCH_API_KEY_1", "s1"),
            ("DETAIL_API_KEY_1", "d1"),
        ]))
        .unwrap();
        assert_eq!(config.detail_secrets(), ["d1"]);
    }

    #[test]
    fn test_model_list_order() {
        let config =
            AppConfig::from_lookup(env(&[("LLM_MODELS", "modelA, modelB,,modelA")])).unwrap();
        assert_eq!(config.llm.models, vec!["modelA", "modelB"]);
    }

    #[test]
    fn test_numeric_overrides() {
        let config = AppConfig::from_lookup(env(&[
            ("STANCHION_MAX_RETRIES", "1"),
            ("STANCHION_DEADLINE_SECS", "30"),
            ("STANCHION_BACKOFF_MULTIPLIER", "1.5"),
            ("STANCHION_COOLDOWN_SECS", "60"),
        ]))
        .unwrap();

        assert_eq!(config.orchestrator.max_retries, 1);
        assert_eq!(config.orchestrator_settings().deadline, Duration::from_secs(30));
        assert!((config.orchestrator.backoff_multiplier - 1.5).abs() < f64::EPSILON);
        assert_eq!(config.pool_settings().cooldown, ChronoDuration::seconds(60));
    }

    #[test]
    fn test_malformed_number_names_variable() {
        let err = AppConfig::from_lookup(env(&[("STANCHION_MAX_RETRIES", "many")])).unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
        assert!(err.to_string().contains("STANCHION_MAX_RETRIES"));
    }

    #[test]
    fn test_invalid_multiplier_rejected() {
        let err =
            AppConfig::from_lookup(env(&[("STANCHION_BACKOFF_MULTIPLIER", "0.5")])).unwrap_err();
        assert!(err.to_string().contains("backoff_multiplier"));
    }

    #[test]
    fn test_out_of_range_durations_rejected() {
        let err = AppConfig::from_lookup(env(&[("STANCHION_CACHE_TTL_SECS", "100000000000000000")]))
            .unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
        assert!(err.to_string().contains("cache.ttl_secs"));

        let err = AppConfig::from_lookup(env(&[("STANCHION_COOLDOWN_SECS", "18446744073709551615")]))
            .unwrap_err();
        assert!(err.to_string().contains("pool.cooldown_secs"));
    }

    #[test]
    fn test_unvalidated_huge_ttl_saturates() {
        let mut config = AppConfig::default();
        config.cache.ttl_secs = u64::MAX;
        config.pool.cooldown_secs = u64::MAX;
        assert_eq!(config.cache_ttl(), ChronoDuration::MAX);
        assert_eq!(config.pool_settings().cooldown, ChronoDuration::MAX);
    }

    #[test]
    fn test_file_layer_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"llm": {"models": ["fileModel"]}, "cache": {"ttl_secs": 60}}"#,
        )
        .unwrap();

        let mut config = AppConfig::load_file(&path).unwrap();
        assert_eq!(config.llm.models, vec!["fileModel"]);
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.pool.max_failures, 3);

        config.apply_env(env(&[("STANCHION_CACHE_TTL_SECS", "120")])).unwrap();
        assert_eq!(config.cache.ttl_secs, 120);
        assert_eq!(config.llm.models, vec!["fileModel"]);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = AppConfig::load_file(Path::new("/nonexistent/stanchion.json")).unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let config = AppConfig::from_lookup(env(&[
            ("SEARCH_API_KEY_1", "super-secret-value"),
            ("LLM_API_KEY", "sk-other-secret"),
        ]))
        .unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret-value"));
        assert!(!debug.contains("sk-other-secret"));
    }
}
