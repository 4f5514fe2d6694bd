//! File persistence helpers.
//!
//! Atomic JSON writes, owner-only permissions, and storage location
//! resolution for deployments whose preferred directory is read-only.

use serde::{Serialize, de::DeserializeOwned};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::StoreError;

/// Directory name used under the platform config/cache roots.
const APP_DIR: &str = "stanchion";

/// Fallback directory name under the process temp directory.
const TEMP_DIR_NAME: &str = "stanchion-cache";

// ============================================================================
// Default Paths
// ============================================================================

/// Returns the default configuration directory (`~/.config/stanchion` on Linux).
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|c| c.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR))
}

/// Returns the default cache directory (`~/.cache/stanchion` on Linux).
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|c| c.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR))
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.json")
}

/// Returns the temp-directory location used when the preferred cache
/// directory is not writable.
pub fn temp_cache_dir() -> PathBuf {
    std::env::temp_dir().join(TEMP_DIR_NAME)
}

// ============================================================================
// Permissions
// ============================================================================

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(mode);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> Result<(), StoreError> {
    Ok(())
}

// ============================================================================
// File Operations
// ============================================================================

/// Saves data to a JSON file.
///
/// Creates the parent directory if needed, writes to a temp file and
/// renames it over the target, and restricts the file to its owner.
pub async fn save_json<T: Serialize>(path: &Path, data: &T) -> Result<(), StoreError> {
    debug!(path = %path.display(), "Saving JSON file");

    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }

    let json = serde_json::to_string_pretty(data)?;

    let temp_path = path.with_extension("json.tmp");
    tokio::fs::write(&temp_path, &json).await?;
    tokio::fs::rename(&temp_path, path).await?;

    set_mode(path, 0o600).await?;
    Ok(())
}

/// Loads data from a JSON file.
pub async fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let content = tokio::fs::read_to_string(path).await?;
    let data = serde_json::from_str(&content)?;
    Ok(data)
}

/// Loads data from a JSON file, returning default if missing or unreadable.
pub async fn load_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match load_json(path).await {
        Ok(data) => data,
        Err(e) => {
            if !matches!(e, StoreError::Io(_)) {
                warn!(path = %path.display(), error = %e, "Failed to load, using defaults");
            }
            T::default()
        }
    }
}

/// Ensures a directory exists, creating it owner-only if missing.
pub async fn ensure_dir(path: &Path) -> Result<(), StoreError> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        debug!(path = %path.display(), "Creating directory");
        tokio::fs::create_dir_all(path).await?;
        set_mode(path, 0o700).await?;
    }
    Ok(())
}

/// Checks that `dir` exists (creating it if needed) and accepts writes.
pub async fn check_writable(dir: &Path) -> Result<(), StoreError> {
    ensure_dir(dir).await?;
    let probe = dir.join(".write-probe");
    tokio::fs::write(&probe, b"ok").await?;
    tokio::fs::remove_file(&probe).await?;
    Ok(())
}

/// Picks the storage directory: `preferred` if writable, otherwise the
/// process temp location.
pub async fn resolve_storage_dir(preferred: &Path) -> PathBuf {
    match check_writable(preferred).await {
        Ok(()) => {
            debug!(path = %preferred.display(), "Using preferred storage directory");
            preferred.to_path_buf()
        }
        Err(e) => {
            let fallback = temp_cache_dir();
            warn!(
                preferred = %preferred.display(),
                fallback = %fallback.display(),
                error = %e,
                "Preferred storage directory not writable, using temp directory"
            );
            if let Err(e) = ensure_dir(&fallback).await {
                warn!(path = %fallback.display(), error = %e, "Temp storage directory unavailable");
            }
            fallback
        }
    }
}
