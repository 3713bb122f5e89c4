//! Key-value store implementations
//!
//! - `InMemoryStore`: process-local, for tests and throwaway runs
//! - `FileStore`: one file per key under a data directory; writes go to a
//!   temporary file that is fsynced and renamed over the target, so a crash
//!   leaves either the old or the new blob

use async_trait::async_trait;
use farmhand_core::{KeyValueStore, StorageError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::PersistenceError;

/// Process-local store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.data.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        self.data.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.data.write().remove(key);
        Ok(())
    }
}

/// Durable store backed by one file per key
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let root = root.into();
        if root.as_os_str().is_empty() {
            return Err(PersistenceError::InvalidConfig(
                "data directory must not be empty".to_string(),
            ));
        }
        std::fs::create_dir_all(&root)?;
        tracing::info!(root = %root.display(), "Opened file store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File name for a key; characters outside `[A-Za-z0-9_.-]` are
    /// percent-encoded so distinct keys never share a file
    fn path_for(&self, key: &str) -> PathBuf {
        let mut name = String::with_capacity(key.len() + 4);
        for byte in key.bytes() {
            match byte {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' => name.push(byte as char),
                // Leading dots would hide the file
                b'.' if !name.is_empty() => name.push('.'),
                other => name.push_str(&format!("%{:02X}", other)),
            }
        }
        name.push_str(".blob");
        self.root.join(name)
    }
}

fn write_atomically(dir: &Path, target: &Path, value: &[u8]) -> std::io::Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(value)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
        let dir = self.root.clone();
        let target = self.path_for(key);

        tokio::task::spawn_blocking(move || write_atomically(&dir, &target, &value))
            .await
            .map_err(|e| StorageError::Backend(format!("write task failed: {}", e)))??;

        tracing::trace!(key, "Persisted blob");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let store = InMemoryStore::new();
        assert_eq!(store.get("missing").await.unwrap(), None);

        store.set("k", b"v1".to_vec()).await.unwrap();
        store.set("k", b"v2".to_vec()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v2".to_vec()));
        assert_eq!(store.len(), 1);

        store.delete("k").await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let store = FileStore::new(dir.path()).unwrap();
        store.set("retry_queue", b"[1,2,3]".to_vec()).await.unwrap();
        drop(store);

        // A fresh handle on the same directory sees the data
        let reopened = FileStore::new(dir.path()).unwrap();
        assert_eq!(reopened.get("retry_queue").await.unwrap(), Some(b"[1,2,3]".to_vec()));
    }

    #[tokio::test]
    async fn test_file_store_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();

        store.set("a", vec![1]).await.unwrap();
        store.delete("a").await.unwrap();
        store.delete("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[test]
    fn test_keys_map_to_distinct_files() {
        let store = FileStore {
            root: PathBuf::from("/data"),
        };
        let a = store.path_for("corrections:user-1");
        let b = store.path_for("corrections_user-1");
        assert_ne!(a, b);
        assert_eq!(a, PathBuf::from("/data/corrections%3Auser-1.blob"));
        // No path traversal
        assert_eq!(store.path_for("../etc").parent(), Some(Path::new("/data")));
    }

    #[test]
    fn test_empty_root_rejected() {
        assert!(matches!(
            FileStore::new(""),
            Err(PersistenceError::InvalidConfig(_))
        ));
    }
}
