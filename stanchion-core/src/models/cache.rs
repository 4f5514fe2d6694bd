//! Cache entry types.
//!
//! This module contains the persisted shape of a cached fetch result:
//! - [`CacheEntry`] - One result per logical key
//! - [`CacheSource`] - Whether the entry was fetched or repurposed

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::category::Category;
use super::content::ContentRecord;

// ============================================================================
// Cache Source
// ============================================================================

/// How a cache entry came to be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheSource {
    /// Written after a successful live fetch.
    #[default]
    Fetched,
    /// Repurposed from another key in the same category.
    Fallback,
}

impl CacheSource {
    /// Returns the display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Fetched => "fetched",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for CacheSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

// ============================================================================
// Cache Entry
// ============================================================================

/// A cached fetch result.
///
/// One entry exists per key (last write wins). An entry expires implicitly at
/// `timestamp + ttl`; expiry is decided at read time and never deletes the
/// entry on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Logical key (the topic text as requested).
    pub key: String,
    /// Category derived from `key`.
    pub category: Category,
    /// Raw text result.
    pub payload: String,
    /// Normalized records parallel to `payload`.
    #[serde(default)]
    pub structured_records: Vec<ContentRecord>,
    /// When the entry was created.
    pub timestamp: DateTime<Utc>,
    /// Whether the entry was fetched or repurposed.
    #[serde(default)]
    pub source: CacheSource,
}

impl CacheEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(
        key: impl Into<String>,
        payload: impl Into<String>,
        structured_records: Vec<ContentRecord>,
        source: CacheSource,
    ) -> Self {
        Self::new_at(key, payload, structured_records, source, Utc::now())
    }

    /// Creates an entry stamped with an explicit time.
    pub fn new_at(
        key: impl Into<String>,
        payload: impl Into<String>,
        structured_records: Vec<ContentRecord>,
        source: CacheSource,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let key = key.into();
        Self {
            category: Category::classify(&key),
            key,
            payload: payload.into(),
            structured_records,
            timestamp,
            source,
        }
    }

    /// Age of the entry at `now`. Entries stamped in the future have zero age.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.timestamp).max(Duration::zero())
    }

    /// Returns true if the entry is still fresh at `now` (`age < ttl`).
    pub fn is_fresh_at(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.age_at(now) < ttl
    }

    /// Returns true if the entry is still fresh right now.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.is_fresh_at(ttl, Utc::now())
    }

    /// Repurposes this entry for a different key in the same category.
    ///
    /// Every literal occurrence of this entry's key inside the payload is
    /// replaced with `requested_key`; the structured records are carried over
    /// untouched. The result keeps the original timestamp and is marked
    /// [`CacheSource::Fallback`].
    pub fn repurpose_for(&self, requested_key: &str) -> CacheEntry {
        let payload = if self.key.is_empty() {
            self.payload.clone()
        } else {
            self.payload.replace(&self.key, requested_key)
        };

        CacheEntry {
            key: requested_key.to_string(),
            category: self.category,
            payload,
            structured_records: self.structured_records.clone(),
            timestamp: self.timestamp,
            source: CacheSource::Fallback,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_derived_from_key() {
        let entry = CacheEntry::new("sunscreen picks", "body", vec![], CacheSource::Fetched);
        assert_eq!(entry.category, Category::Skincare);
    }

    #[test]
    fn test_freshness_boundary() {
        let t0 = Utc::now();
        let entry = CacheEntry::new_at("k", "p", vec![], CacheSource::Fetched, t0);
        let ttl = Duration::hours(6);

        assert!(entry.is_fresh_at(ttl, t0 + Duration::hours(6) - Duration::seconds(1)));
        assert!(!entry.is_fresh_at(ttl, t0 + Duration::hours(6)));
        assert!(!entry.is_fresh_at(ttl, t0 + Duration::hours(7)));
    }

    #[test]
    fn test_future_timestamp_has_zero_age() {
        let now = Utc::now();
        let entry =
            CacheEntry::new_at("k", "p", vec![], CacheSource::Fetched, now + Duration::hours(1));
        assert_eq!(entry.age_at(now), Duration::zero());
    }

    #[test]
    fn test_repurpose_replaces_key_text() {
        let entry = CacheEntry::new(
            "skincare",
            "Top skincare notes: skincare routine for summer",
            vec![ContentRecord::new("1", "skincare haul")],
            CacheSource::Fetched,
        );
        let repurposed = entry.repurpose_for("sunscreen");

        assert_eq!(repurposed.key, "sunscreen");
        assert_eq!(
            repurposed.payload,
            "Top sunscreen notes: sunscreen routine for summer"
        );
        assert_eq!(repurposed.source, CacheSource::Fallback);
        assert_eq!(repurposed.category, Category::Skincare);
        assert_eq!(repurposed.timestamp, entry.timestamp);
        assert_eq!(repurposed.structured_records, entry.structured_records);
    }
}
