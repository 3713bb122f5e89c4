//! Error types shared across crates

use thiserror::Error;

/// Crate-spanning error
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Execution error: {0}")]
    Execution(#[from] crate::action::ExecutionError),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<crate::traits::StorageError> for Error {
    fn from(err: crate::traits::StorageError) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<crate::traits::SemanticError> for Error {
    fn from(err: crate::traits::SemanticError) -> Self {
        Error::ExternalService(err.to_string())
    }
}
