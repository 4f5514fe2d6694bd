//! Persistence helper tests.

use std::path::PathBuf;
use tempfile::TempDir;

use stanchion_core::{CacheEntry, CacheSource};

use crate::persistence::{check_writable, ensure_dir, load_json, load_json_or_default, save_json};

#[tokio::test]
async fn test_save_and_load_entry() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("entry.json");

    let entry = CacheEntry::new("sunscreen", "payload", vec![], CacheSource::Fetched);
    save_json(&path, &entry).await.unwrap();

    let loaded: CacheEntry = load_json(&path).await.unwrap();
    assert_eq!(loaded, entry);
    assert!(!path.with_extension("json.tmp").exists());
}

#[tokio::test]
async fn test_save_creates_parent_directories() {
    let temp_dir = TempDir::new().unwrap();
    let nested = temp_dir.path().join("a").join("b").join("entry.json");

    save_json(&nested, &serde_json::json!({"key": "value"}))
        .await
        .unwrap();
    assert!(nested.exists());
}

#[tokio::test]
async fn test_load_nonexistent_file() {
    let result: Result<CacheEntry, _> =
        load_json(&PathBuf::from("/nonexistent/path/entry.json")).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_load_or_default_on_garbage() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("garbage.json");
    tokio::fs::write(&path, "not json").await.unwrap();

    let value: Vec<String> = load_json_or_default(&path).await;
    assert!(value.is_empty());
}

#[tokio::test]
async fn test_ensure_dir_and_writable() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().join("cache");

    ensure_dir(&dir).await.unwrap();
    assert!(dir.is_dir());
    check_writable(&dir).await.unwrap();
    assert!(!dir.join(".write-probe").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_saved_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("entry.json");
    save_json(&path, &serde_json::json!({})).await.unwrap();

    let mode = tokio::fs::metadata(&path).await.unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
}
