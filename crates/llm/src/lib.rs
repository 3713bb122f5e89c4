//! Semantic helpers backed by a local LLM
//!
//! Features:
//! - Ollama chat backend in JSON mode with retry/backoff
//! - Intent classification constrained to a candidate set
//! - Slot extraction validated against the intent schema
//! - No-op implementations for rule-only deployments

pub mod backend;
pub mod prompt;
pub mod semantic;

use std::sync::Arc;

use farmhand_config::SemanticConfig;
use farmhand_core::{SemanticClassifier, SemanticError, SemanticExtractor};

pub use backend::{LlmConfig, OllamaBackend};
pub use prompt::{Message, Role};
pub use semantic::{
    LlmSemanticClassifier, LlmSemanticExtractor, NoopSemanticClassifier, NoopSemanticExtractor,
};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for SemanticError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Timeout => SemanticError::Timeout,
            LlmError::InvalidResponse(msg) => SemanticError::InvalidResponse(msg),
            other => SemanticError::Unavailable(other.to_string()),
        }
    }
}

impl From<LlmError> for farmhand_core::Error {
    fn from(err: LlmError) -> Self {
        farmhand_core::Error::ExternalService(err.to_string())
    }
}

/// Classifier and extractor pair chosen from configuration
#[derive(Clone)]
pub struct SemanticServices {
    pub classifier: Arc<dyn SemanticClassifier>,
    pub extractor: Arc<dyn SemanticExtractor>,
}

impl SemanticServices {
    /// Rule-only deployment
    pub fn disabled() -> Self {
        Self {
            classifier: Arc::new(NoopSemanticClassifier),
            extractor: Arc::new(NoopSemanticExtractor),
        }
    }
}

/// Build the semantic services for `config`.
///
/// Disabled configuration yields the no-op pair; otherwise both helpers share
/// one Ollama client.
pub fn create_semantic_services(config: &SemanticConfig) -> Result<SemanticServices, LlmError> {
    if !config.enabled {
        tracing::info!("Semantic helpers disabled, using rule-based classification only");
        return Ok(SemanticServices::disabled());
    }

    let backend = OllamaBackend::new(LlmConfig::from(config))?;
    tracing::info!(
        endpoint = %backend.config().endpoint,
        model = backend.model_name(),
        "Semantic helpers enabled"
    );

    Ok(SemanticServices {
        classifier: Arc::new(LlmSemanticClassifier::new(backend.clone())),
        extractor: Arc::new(LlmSemanticExtractor::new(backend)),
    })
}
