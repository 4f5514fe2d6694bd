//! In-process tier in front of the disk cache.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use stanchion_core::CacheEntry;

/// Result of a memory-tier lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryLookup {
    /// A fresh entry.
    Fresh(CacheEntry),
    /// An entry exists but is past its TTL.
    Expired,
    /// Nothing stored for the key.
    Absent,
}

/// Thread-safe map of the most recent entry per key.
#[derive(Debug, Default)]
pub struct MemoryTier {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryTier {
    /// Creates an empty tier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up `key` as of `now`.
    pub async fn lookup(&self, key: &str, ttl: Duration, now: DateTime<Utc>) -> MemoryLookup {
        match self.entries.read().await.get(key) {
            Some(entry) if entry.is_fresh_at(ttl, now) => MemoryLookup::Fresh(entry.clone()),
            Some(_) => MemoryLookup::Expired,
            None => MemoryLookup::Absent,
        }
    }

    /// Stores an entry, replacing any previous one for its key.
    pub async fn insert(&self, entry: CacheEntry) {
        self.entries.write().await.insert(entry.key.clone(), entry);
    }

    /// Drops entries past their TTL, returning how many were removed.
    pub async fn remove_expired(&self, ttl: Duration, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh_at(ttl, now));
        before - entries.len()
    }

    /// Copies every held entry, including expired ones.
    pub async fn snapshot(&self) -> Vec<CacheEntry> {
        self.entries.read().await.values().cloned().collect()
    }

    /// Number of entries held, including expired ones.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
