//! Tiered cache behaviour tests.
//!
//! Freshness, corruption handling, category fallback and sweeping, all
//! against a real directory with explicit timestamps.

use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;

use stanchion_core::{CacheSource, Category, ContentRecord};

use crate::cache::{TieredCache, cache_file_name};

fn t0() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + Duration::days(20_000)
}

fn cache(dir: &TempDir) -> TieredCache {
    TieredCache::new(dir.path(), Duration::hours(6))
}

/// Same directory, fresh memory tier: every read goes to disk.
fn reopened(dir: &TempDir) -> TieredCache {
    cache(dir)
}

// ============================================================================
// get / put
// ============================================================================

#[tokio::test]
async fn test_put_then_get() {
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir);

    let records = vec![ContentRecord::new("n1", "My sunscreen list").with_engagement(10, 2, 3)];
    cache
        .put_at("sunscreen", "payload", records.clone(), CacheSource::Fetched, t0())
        .await
        .unwrap();

    let entry = reopened(&dir).get_at("sunscreen", t0() + Duration::hours(1)).await.unwrap();
    assert_eq!(entry.payload, "payload");
    assert_eq!(entry.category, Category::Skincare);
    assert_eq!(entry.structured_records, records);
    assert_eq!(entry.source, CacheSource::Fetched);
}

#[tokio::test]
async fn test_expired_entry_is_miss_but_file_remains() {
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir);
    cache
        .put_at("sunscreen", "payload", vec![], CacheSource::Fetched, t0())
        .await
        .unwrap();

    let just_before = t0() + Duration::hours(6) - Duration::seconds(1);
    assert!(cache.get_at("sunscreen", just_before).await.is_some());
    assert!(reopened(&dir).get_at("sunscreen", just_before).await.is_some());

    let at_ttl = t0() + Duration::hours(6);
    assert!(cache.get_at("sunscreen", at_ttl).await.is_none());
    assert!(reopened(&dir).get_at("sunscreen", at_ttl).await.is_none());

    assert!(dir.path().join(cache_file_name("sunscreen")).exists());
}

#[tokio::test]
async fn test_missing_and_corrupt_are_misses() {
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir);
    assert!(cache.get_at("nothing", t0()).await.is_none());

    std::fs::write(dir.path().join(cache_file_name("broken")), "{not json").unwrap();
    assert!(cache.get_at("broken", t0()).await.is_none());
}

#[tokio::test]
async fn test_colliding_file_name_is_miss() {
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir);
    assert_eq!(cache_file_name("a b"), cache_file_name("a_b"));

    cache
        .put_at("a b", "payload", vec![], CacheSource::Fetched, t0())
        .await
        .unwrap();
    assert!(reopened(&dir).get_at("a_b", t0()).await.is_none());
    assert!(reopened(&dir).get_at("a b", t0()).await.is_some());
}

#[tokio::test]
async fn test_last_write_wins() {
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir);
    cache
        .put_at("coffee", "first", vec![], CacheSource::Fetched, t0())
        .await
        .unwrap();
    cache
        .put_at("coffee", "second", vec![], CacheSource::Fetched, t0() + Duration::minutes(1))
        .await
        .unwrap();

    let entry = reopened(&dir).get_at("coffee", t0() + Duration::minutes(2)).await.unwrap();
    assert_eq!(entry.payload, "second");
}

#[tokio::test]
async fn test_blank_key_rejected() {
    let dir = TempDir::new().unwrap();
    let result = cache(&dir)
        .put_at("  ", "payload", vec![], CacheSource::Fetched, t0())
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_memory_tier_serves_without_disk() {
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir);
    cache
        .put_at("sunscreen", "payload", vec![], CacheSource::Fetched, t0())
        .await
        .unwrap();
    std::fs::remove_file(dir.path().join(cache_file_name("sunscreen"))).unwrap();

    assert!(cache.get_at("sunscreen", t0()).await.is_some());
    assert!(reopened(&dir).get_at("sunscreen", t0()).await.is_none());
}

#[test]
fn test_file_names_are_safe() {
    assert_eq!(cache_file_name("../etc/passwd"), "___etc_passwd.json");
    assert_eq!(cache_file_name("防晒 推荐"), "防晒_推荐.json");

    let long = "x".repeat(300);
    let name = cache_file_name(&long);
    assert!(name.len() < 130);
    assert_ne!(name, cache_file_name(&"x".repeat(301)));
}

// ============================================================================
// Fallback
// ============================================================================

#[tokio::test]
async fn test_fallback_repurposes_same_category_entry() {
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir);
    cache
        .put_at(
            "skincare",
            "Top skincare notes. Why skincare matters.",
            vec![ContentRecord::new("n1", "skincare haul")],
            CacheSource::Fetched,
            t0(),
        )
        .await
        .unwrap();

    let now = t0() + Duration::hours(1);
    let fresh = reopened(&dir);
    assert!(fresh.get_at("sunscreen", now).await.is_none());

    let entry = fresh.get_fallback_at("sunscreen", now).await.unwrap();
    assert_eq!(entry.key, "sunscreen");
    assert_eq!(entry.payload, "Top sunscreen notes. Why sunscreen matters.");
    assert_eq!(entry.source, CacheSource::Fallback);
    assert_eq!(entry.category, Category::Skincare);
    assert_eq!(entry.timestamp, t0());
}

#[tokio::test]
async fn test_fallback_ignores_other_categories() {
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir);
    cache
        .put_at("coffee", "coffee payload", vec![], CacheSource::Fetched, t0())
        .await
        .unwrap();

    assert!(cache.get_fallback_at("sunscreen", t0()).await.is_none());
}

#[tokio::test]
async fn test_fallback_ignores_expired_entries() {
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir);
    cache
        .put_at("skincare", "payload", vec![], CacheSource::Fetched, t0())
        .await
        .unwrap();

    assert!(
        cache
            .get_fallback_at("sunscreen", t0() + Duration::hours(6))
            .await
            .is_none()
    );
}

#[tokio::test]
async fn test_fallback_prefers_newest() {
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir);
    cache
        .put_at("retinol", "old retinol", vec![], CacheSource::Fetched, t0())
        .await
        .unwrap();
    cache
        .put_at("serum", "new serum", vec![], CacheSource::Fetched, t0() + Duration::hours(2))
        .await
        .unwrap();

    let entry = reopened(&dir)
        .get_fallback_at("sunscreen", t0() + Duration::hours(3))
        .await
        .unwrap();
    assert_eq!(entry.payload, "new sunscreen");
}

#[tokio::test]
async fn test_fallback_skips_corrupt_files() {
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir);
    std::fs::write(dir.path().join("garbage.json"), "[]").unwrap();
    cache
        .put_at("acne", "acne tips", vec![], CacheSource::Fetched, t0())
        .await
        .unwrap();

    let entry = reopened(&dir).get_fallback_at("spf 50", t0()).await.unwrap();
    assert_eq!(entry.payload, "spf 50 tips");
}

// ============================================================================
// Sweep & stats
// ============================================================================

#[tokio::test]
async fn test_sweep_removes_expired_and_corrupt() {
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir);
    cache
        .put_at("old", "p", vec![], CacheSource::Fetched, t0())
        .await
        .unwrap();
    cache
        .put_at("new", "p", vec![], CacheSource::Fetched, t0() + Duration::hours(5))
        .await
        .unwrap();
    std::fs::write(dir.path().join("corrupt.json"), "{").unwrap();

    let report = cache.sweep_at(t0() + Duration::hours(7)).await;
    assert_eq!(report.expired_removed, 1);
    assert_eq!(report.corrupt_removed, 1);
    assert_eq!(report.kept, 1);
    assert_eq!(report.memory_removed, 1);

    assert!(!dir.path().join(cache_file_name("old")).exists());
    assert!(!dir.path().join("corrupt.json").exists());
    assert!(dir.path().join(cache_file_name("new")).exists());
}

#[tokio::test]
async fn test_stats() {
    let dir = TempDir::new().unwrap();
    let cache = cache(&dir);
    cache
        .put_at("sunscreen", "p", vec![], CacheSource::Fetched, t0())
        .await
        .unwrap();
    cache
        .put_at("coffee", "p", vec![], CacheSource::Fetched, t0() + Duration::hours(3))
        .await
        .unwrap();
    std::fs::write(dir.path().join("bad.json"), "nope").unwrap();

    let stats = cache.stats_at(t0() + Duration::hours(7)).await;
    assert_eq!(stats.entries, 3);
    assert_eq!(stats.fresh, 1);
    assert_eq!(stats.expired, 1);
    assert_eq!(stats.corrupt, 1);
    assert_eq!(stats.by_category.get(&Category::Food), Some(&1));
    assert_eq!(stats.memory_entries, 2);
    assert_eq!(stats.directory, dir.path());
}

// ============================================================================
// Storage location
// ============================================================================

#[tokio::test]
async fn test_unwritable_preferred_dir_falls_back_to_temp() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "file").unwrap();

    let cache = TieredCache::new(blocker.join("cache"), Duration::hours(6));
    let resolved = cache.storage_dir().await.to_path_buf();
    assert_eq!(resolved, crate::persistence::temp_cache_dir());

    // Resolved once and reused.
    assert_eq!(cache.storage_dir().await, resolved.as_path());
}
