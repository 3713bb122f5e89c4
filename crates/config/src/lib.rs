//! Configuration management for the farmhand assistant
//!
//! Supports loading configuration from:
//! - YAML/TOML/JSON files (`config/default`, `config/{env}`)
//! - Environment variables (`FARMHAND__` prefix, `__` separator)
//! - An explicit file path

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, load_settings_from_file, ClarificationConfig, ContextConfig, ExecutorConfig,
    GateConfig, ObservabilityConfig, PersistenceConfig, RetryQueueConfig, RuntimeEnvironment,
    SemanticConfig, ServerConfig, Settings, StorageBackend,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Environment error: {0}")]
    Environment(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
