//! Persistence layer for the farmhand assistant
//!
//! Provides:
//! - Key-value stores (in-memory and file-backed)
//! - The durable retry queue for transiently failed actions

pub mod error;
pub mod retry_queue;
pub mod store;

use std::sync::Arc;

use farmhand_config::{PersistenceConfig, StorageBackend};
use farmhand_core::KeyValueStore;

pub use error::PersistenceError;
pub use retry_queue::{QueuePassReport, QueuePassStatus, RetryQueue};
pub use store::{FileStore, InMemoryStore};

/// Open the key-value store selected by configuration
pub fn open_store(config: &PersistenceConfig) -> Result<Arc<dyn KeyValueStore>, PersistenceError> {
    match config.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; queued actions will not survive a restart");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StorageBackend::File => Ok(Arc::new(FileStore::new(&config.data_dir)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_file_store_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = PersistenceConfig {
            backend: StorageBackend::File,
            data_dir: dir.path().join("nested"),
        };

        let store = open_store(&config).unwrap();
        store.set("k", vec![7]).await.unwrap();

        assert!(dir.path().join("nested").join("k.blob").exists());
    }

    #[tokio::test]
    async fn test_open_memory_store() {
        let config = PersistenceConfig {
            backend: StorageBackend::Memory,
            ..PersistenceConfig::default()
        };
        let store = open_store(&config).unwrap();
        assert_eq!(store.get("anything").await.unwrap(), None);
    }
}
