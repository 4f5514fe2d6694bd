// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Stanchion Store
//!
//! Local state for stanchion.
//!
//! This crate provides:
//!
//! - **TieredCache**: Memory + disk cache of fetch results with TTL and
//!   same-category fallback
//! - **AppConfig**: Layered configuration (defaults, JSON file, environment)
//! - **Persistence**: File I/O helpers for JSON data
//!
//! ## Usage
//!
//! ```ignore
//! use stanchion_store::{AppConfig, TieredCache};
//! use stanchion_core::CacheSource;
//!
//! let config = AppConfig::load(None)?;
//! let cache = TieredCache::new(config.cache_dir(), config.cache_ttl());
//!
//! cache.put("skincare", payload, records, CacheSource::Fetched).await?;
//!
//! let entry = match cache.get("sunscreen").await {
//!     Some(entry) => entry,
//!     None => cache.get_fallback("sunscreen").await.ok_or(NoData)?,
//! };
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod memory;
pub mod persistence;

pub use cache::{CacheStats, DEFAULT_TTL_SECS, SweepReport, TieredCache, cache_file_name};
pub use config::{AppConfig, CacheConfig, LlmConfig, OrchestratorConfig, PoolConfig, SearchConfig};
pub use error::StoreError;
pub use persistence::{
    default_cache_dir, default_config_dir, default_config_path, load_json, load_json_or_default,
    save_json,
};

#[cfg(test)]
mod cache_tests;
#[cfg(test)]
mod persistence_tests;
