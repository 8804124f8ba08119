//! # Session Store
//!
//! Key/value persistence scoped to one session, with timestamped snapshots.
//!
//! Two backends:
//! - [`MemoryStore`]: lives as long as the process
//! - [`FileStore`]: one JSON file per key inside a directory
//!
//! Snapshots are stored as `{"data": ..., "timestamp": <unix ms>}` under a
//! single key. A snapshot older than the caller's TTL, or one that no longer
//! parses, reads as absent.

use async_trait::async_trait;
use lib_core::{AppError, Result};
use lib_utils::time::{age_millis, now_millis};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

// region: --- MemoryStore

#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().clear();
        Ok(())
    }
}

// endregion: --- MemoryStore

// region: --- FileStore

/// Directory-backed store. Keys map to `<dir>/<sanitized key>.json`.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Config(format!("Cannot create {}: {}", dir.display(), e)))?;
        debug!("Session store at {}", dir.display());
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", name))
    }
}

fn io_error(action: &str, path: &Path, err: std::io::Error) -> AppError {
    AppError::Internal(format!("Failed to {} {}: {}", action, path.display(), err))
}

#[async_trait]
impl SessionStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error("read", &path, e)),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let path = self.path_for(key);
        tokio::fs::write(&path, value)
            .await
            .map_err(|e| io_error("write", &path, e))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("remove", &path, e)),
        }
    }

    async fn clear(&self) -> Result<()> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| io_error("list", &self.dir, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error("list", &self.dir, e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                tokio::fs::remove_file(&path)
                    .await
                    .map_err(|e| io_error("remove", &path, e))?;
            }
        }
        Ok(())
    }
}

// endregion: --- FileStore

// region: --- Snapshots

#[derive(Serialize, Deserialize)]
struct Snapshot<T> {
    data: T,
    /// Unix milliseconds at write time.
    timestamp: i64,
}

/// Write `data` under `key` stamped with the current time.
pub async fn save_snapshot<T: Serialize + Sync>(store: &dyn SessionStore, key: &str, data: &T) -> Result<()> {
    let snapshot = Snapshot {
        data,
        timestamp: now_millis(),
    };
    let encoded = serde_json::to_string(&snapshot)?;
    store.set(key, encoded).await
}

/// Read the snapshot under `key` if it is younger than `ttl`.
///
/// Unreadable, malformed, expired or future-dated snapshots yield `None`.
pub async fn load_snapshot<T: DeserializeOwned>(store: &dyn SessionStore, key: &str, ttl: Duration) -> Option<T> {
    let raw = match store.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!("Session store read of {} failed: {}", key, e);
            return None;
        }
    };

    let snapshot: Snapshot<T> = match serde_json::from_str(&raw) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!("Discarding unreadable snapshot {}: {}", key, e);
            return None;
        }
    };

    match age_millis(snapshot.timestamp) {
        Some(age) if u128::from(age) < ttl.as_millis() => Some(snapshot.data),
        _ => {
            debug!("Snapshot {} expired", key);
            None
        }
    }
}

// endregion: --- Snapshots

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_store_basic_ops() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", "v".to_string()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("a", "1".to_string()).await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();

        let store = FileStore::open(dir.path()).await.unwrap();
        store.set("solana-trending-collections-cache", "{}".to_string()).await.unwrap();

        let reopened = FileStore::open(dir.path()).await.unwrap();
        assert_eq!(
            reopened.get("solana-trending-collections-cache").await.unwrap().as_deref(),
            Some("{}")
        );

        reopened.remove("missing").await.unwrap();
        reopened.clear().await.unwrap();
        assert_eq!(reopened.get("solana-trending-collections-cache").await.unwrap(), None);
    }

    #[test]
    fn test_file_store_sanitizes_keys() {
        let store = FileStore { dir: PathBuf::from("/tmp/s") };
        assert_eq!(store.path_for("../etc/passwd"), PathBuf::from("/tmp/s/___etc_passwd.json"));
    }

    #[tokio::test]
    async fn test_fresh_snapshot_round_trip() {
        let store = MemoryStore::new();
        save_snapshot(&store, "snap", &json!({"x": 1})).await.unwrap();

        let loaded: Option<serde_json::Value> = load_snapshot(&store, "snap", Duration::from_secs(300)).await;
        assert_eq!(loaded, Some(json!({"x": 1})));
    }

    #[tokio::test]
    async fn test_expired_snapshot_is_ignored() {
        let store = MemoryStore::new();
        let stale = json!({ "data": [1, 2], "timestamp": now_millis() - 301_000 });
        store.set("snap", stale.to_string()).await.unwrap();

        let loaded: Option<Vec<u32>> = load_snapshot(&store, "snap", Duration::from_secs(300)).await;
        assert_eq!(loaded, None);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_ignored() {
        let store = MemoryStore::new();
        store.set("snap", "not json".to_string()).await.unwrap();

        let loaded: Option<Vec<u32>> = load_snapshot(&store, "snap", Duration::from_secs(300)).await;
        assert_eq!(loaded, None);
    }
}
