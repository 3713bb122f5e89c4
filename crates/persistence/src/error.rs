//! Persistence error types

use farmhand_core::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid storage configuration: {0}")]
    InvalidConfig(String),
}

impl From<std::io::Error> for PersistenceError {
    fn from(err: std::io::Error) -> Self {
        PersistenceError::Storage(StorageError::Io(err))
    }
}

impl From<PersistenceError> for farmhand_core::Error {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Serialization(e) => farmhand_core::Error::Serialization(e),
            other => farmhand_core::Error::Storage(other.to_string()),
        }
    }
}
