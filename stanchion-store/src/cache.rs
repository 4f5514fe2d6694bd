//! Tiered result cache with category fallback.
//!
//! Entries live in memory and on disk, one JSON file per key. An entry is a
//! miss once `now - timestamp >= ttl`, but nothing is deleted at read time;
//! files are only removed by [`TieredCache::sweep`].
//!
//! When a fresh fetch is impossible, [`TieredCache::get_fallback`] serves the
//! freshest entry of another key in the same category, with the old key text
//! replaced by the requested one.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use stanchion_core::{CacheEntry, CacheSource, Category, ContentRecord};

use crate::error::StoreError;
use crate::memory::{MemoryLookup, MemoryTier};
use crate::persistence::{load_json, resolve_storage_dir, save_json};

/// Default time-to-live (6 hours).
pub const DEFAULT_TTL_SECS: i64 = 6 * 60 * 60;

/// Longest sanitised key kept verbatim in a file name.
const MAX_STEM_CHARS: usize = 96;

// ============================================================================
// Reports
// ============================================================================

/// Outcome of a sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Files removed because they were past their TTL.
    pub expired_removed: usize,
    /// Files removed because they failed to parse.
    pub corrupt_removed: usize,
    /// Files kept.
    pub kept: usize,
    /// Memory-tier entries dropped.
    pub memory_removed: usize,
}

/// Snapshot of cache contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Resolved storage directory.
    pub directory: PathBuf,
    /// Entry files on disk.
    pub entries: usize,
    /// Entries still fresh.
    pub fresh: usize,
    /// Entries past their TTL.
    pub expired: usize,
    /// Files that failed to parse.
    pub corrupt: usize,
    /// Fresh entries per category.
    pub by_category: BTreeMap<Category, usize>,
    /// Entries held in memory.
    pub memory_entries: usize,
}

// ============================================================================
// File Naming
// ============================================================================

/// Maps a key to a filesystem-safe file name.
///
/// Anything other than letters, digits and `-` becomes `_`. Long keys are
/// truncated and suffixed with a hash of the full key. Distinct keys can
/// still map to the same name; reads compare the stored key and treat a
/// mismatch as a miss.
pub fn cache_file_name(key: &str) -> String {
    let safe: String = key
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();

    if safe.chars().count() <= MAX_STEM_CHARS {
        return format!("{safe}.json");
    }

    let stem: String = safe.chars().take(MAX_STEM_CHARS).collect();
    format!("{stem}-{:016x}.json", fnv1a(key))
}

fn fnv1a(text: &str) -> u64 {
    text.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

// ============================================================================
// Tiered Cache
// ============================================================================

/// One stored file and its parse result.
struct StoredFile {
    path: PathBuf,
    entry: Result<CacheEntry, StoreError>,
}

/// Memory + disk cache of fetch results.
#[derive(Debug)]
pub struct TieredCache {
    preferred_dir: PathBuf,
    ttl: Duration,
    memory: MemoryTier,
    dir: OnceCell<PathBuf>,
}

impl TieredCache {
    /// Creates a cache rooted at `preferred_dir` (resolved on first use).
    pub fn new(preferred_dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            preferred_dir: preferred_dir.into(),
            ttl,
            memory: MemoryTier::new(),
            dir: OnceCell::new(),
        }
    }

    /// Time-to-live for entries.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The storage directory.
    ///
    /// Resolved once per cache instance: the preferred directory if it
    /// accepts writes, otherwise a temp-directory location.
    pub async fn storage_dir(&self) -> &Path {
        self.dir
            .get_or_init(|| resolve_storage_dir(&self.preferred_dir))
            .await
    }

    async fn entry_path(&self, key: &str) -> PathBuf {
        self.storage_dir().await.join(cache_file_name(key))
    }

    /// Returns the fresh entry for `key`, if any.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        self.get_at(key, Utc::now()).await
    }

    /// Returns the entry for `key` if it is fresh at `now`.
    ///
    /// Absent, unreadable, corrupt and expired entries are all misses.
    #[instrument(skip(self, now))]
    pub async fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<CacheEntry> {
        if let MemoryLookup::Fresh(entry) = self.memory.lookup(key, self.ttl, now).await {
            debug!("Cache hit (memory)");
            return Some(entry);
        }

        let path = self.entry_path(key).await;
        let entry: CacheEntry = match load_json(&path).await {
            Ok(entry) => entry,
            Err(StoreError::Io(_)) => {
                debug!("Cache miss");
                return None;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Corrupt cache entry, treating as miss");
                return None;
            }
        };

        if entry.key != key {
            debug!(stored = %entry.key, "Cache file belongs to another key, treating as miss");
            return None;
        }

        if !entry.is_fresh_at(self.ttl, now) {
            debug!(age_secs = entry.age_at(now).num_seconds(), "Cache entry expired");
            return None;
        }

        debug!("Cache hit (disk)");
        self.memory.insert(entry.clone()).await;
        Some(entry)
    }

    /// Stores a result for `key`, replacing any previous entry.
    pub async fn put(
        &self,
        key: &str,
        payload: impl Into<String>,
        structured_records: Vec<ContentRecord>,
        source: CacheSource,
    ) -> Result<CacheEntry, StoreError> {
        self.put_at(key, payload, structured_records, source, Utc::now())
            .await
    }

    /// Stores a result for `key` stamped at `now`.
    ///
    /// The memory tier is updated even if the disk write fails.
    ///
    /// # Errors
    ///
    /// Returns an error for a blank key or a failed disk write.
    #[instrument(skip(self, payload, structured_records, now))]
    pub async fn put_at(
        &self,
        key: &str,
        payload: impl Into<String>,
        structured_records: Vec<ContentRecord>,
        source: CacheSource,
        now: DateTime<Utc>,
    ) -> Result<CacheEntry, StoreError> {
        if key.trim().is_empty() {
            return Err(StoreError::InvalidKey(key.to_string()));
        }

        let entry = CacheEntry::new_at(key, payload, structured_records, source, now);
        self.memory.insert(entry.clone()).await;

        let path = self.entry_path(key).await;
        save_json(&path, &entry).await?;

        debug!(category = %entry.category, path = %path.display(), "Cache entry stored");
        Ok(entry)
    }

    /// Returns a same-category substitute for `key`, if any.
    pub async fn get_fallback(&self, key: &str) -> Option<CacheEntry> {
        self.get_fallback_at(key, Utc::now()).await
    }

    /// Returns a same-category substitute for `key` as of `now`.
    ///
    /// Among fresh entries whose category equals `category(key)`, the newest
    /// one is repurposed for `key` and marked as a fallback.
    #[instrument(skip(self, now))]
    pub async fn get_fallback_at(&self, key: &str, now: DateTime<Utc>) -> Option<CacheEntry> {
        let category = Category::classify(key);

        let mut candidates: HashMap<String, CacheEntry> = HashMap::new();
        let stored = self.scan().await;
        let memory = self.memory.snapshot().await;

        for entry in stored
            .into_iter()
            .filter_map(|file| file.entry.ok())
            .chain(memory)
        {
            if entry.category != category || !entry.is_fresh_at(self.ttl, now) {
                continue;
            }
            let newer = candidates
                .get(&entry.key)
                .is_none_or(|existing| existing.timestamp < entry.timestamp);
            if newer {
                candidates.insert(entry.key.clone(), entry);
            }
        }

        let Some(best) = candidates.into_values().max_by_key(|e| e.timestamp) else {
            debug!(category = %category, "No fallback available");
            return None;
        };

        info!(
            requested = %key,
            served = %best.key,
            category = %category,
            "Serving category fallback"
        );
        Some(best.repurpose_for(key))
    }

    /// Removes expired and corrupt entries.
    pub async fn sweep(&self) -> SweepReport {
        self.sweep_at(Utc::now()).await
    }

    /// Removes entries expired at `now` and any file that fails to parse.
    #[instrument(skip(self, now))]
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        for file in self.scan().await {
            let reason = match file.entry {
                Err(_) => "corrupt",
                Ok(ref entry) if !entry.is_fresh_at(self.ttl, now) => "expired",
                Ok(_) => {
                    report.kept += 1;
                    continue;
                }
            };

            match tokio::fs::remove_file(&file.path).await {
                Ok(()) => {
                    debug!(path = %file.path.display(), reason, "Removed cache entry");
                    if reason == "corrupt" {
                        report.corrupt_removed += 1;
                    } else {
                        report.expired_removed += 1;
                    }
                }
                Err(e) => warn!(path = %file.path.display(), error = %e, "Failed to remove cache entry"),
            }
        }

        report.memory_removed = self.memory.remove_expired(self.ttl, now).await;
        info!(
            expired = report.expired_removed,
            corrupt = report.corrupt_removed,
            kept = report.kept,
            "Cache sweep finished"
        );
        report
    }

    /// Summarises cache contents.
    pub async fn stats(&self) -> CacheStats {
        self.stats_at(Utc::now()).await
    }

    /// Summarises cache contents as of `now`.
    pub async fn stats_at(&self, now: DateTime<Utc>) -> CacheStats {
        let files = self.scan().await;
        let mut stats = CacheStats {
            directory: self.storage_dir().await.to_path_buf(),
            entries: files.len(),
            fresh: 0,
            expired: 0,
            corrupt: 0,
            by_category: BTreeMap::new(),
            memory_entries: self.memory.len().await,
        };

        for file in files {
            match file.entry {
                Ok(entry) if entry.is_fresh_at(self.ttl, now) => {
                    stats.fresh += 1;
                    *stats.by_category.entry(entry.category).or_default() += 1;
                }
                Ok(_) => stats.expired += 1,
                Err(_) => stats.corrupt += 1,
            }
        }
        stats
    }

    /// Reads every entry file in the storage directory.
    async fn scan(&self) -> Vec<StoredFile> {
        let dir = self.storage_dir().await;
        let mut files = Vec::new();

        let mut reader = match tokio::fs::read_dir(dir).await {
            Ok(reader) => reader,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Cannot list cache directory");
                return files;
            }
        };

        loop {
            let item = match reader.next_entry().await {
                Ok(Some(item)) => item,
                Ok(None) => break,
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "Cache directory listing interrupted");
                    break;
                }
            };

            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let entry = load_json::<CacheEntry>(&path).await;
            files.push(StoredFile { path, entry });
        }

        files
    }
}
