//! Optional semantic collaborators
//!
//! Both are advisory. Callers treat any error as "no result" and fall back
//! to the rule-based path.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::intent::Intent;
use crate::slots::{ExtractedParameters, SlotName};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SemanticError {
    #[error("semantic service unavailable: {0}")]
    Unavailable(String),

    #[error("invalid semantic response: {0}")]
    InvalidResponse(String),

    #[error("semantic service timed out")]
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticClassification {
    pub intent: Intent,
    /// Certainty in [0, 1]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: Option<String>,
}

#[async_trait]
pub trait SemanticClassifier: Send + Sync {
    /// Pick one of `candidates` for `text`, or `None` when unsure
    async fn classify(
        &self,
        text: &str,
        candidates: &[Intent],
    ) -> Result<Option<SemanticClassification>, SemanticError>;

    /// False for the no-op implementation; lets callers skip the call
    fn is_available(&self) -> bool {
        true
    }
}

#[async_trait]
pub trait SemanticExtractor: Send + Sync {
    /// Extract values for `missing` slots of `intent` from `text`
    async fn extract(
        &self,
        text: &str,
        intent: Intent,
        missing: &[SlotName],
    ) -> Result<ExtractedParameters, SemanticError>;

    fn is_available(&self) -> bool {
        true
    }
}
