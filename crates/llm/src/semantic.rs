//! Semantic classifier and extractor implementations

use async_trait::async_trait;
use farmhand_core::{
    ExtractedParameters, Intent, Provenance, SemanticClassification, SemanticClassifier,
    SemanticError, SemanticExtractor, SlotName, SlotValue,
};

use crate::backend::OllamaBackend;
use crate::prompt;

/// Intent classifier backed by an Ollama chat model
#[derive(Debug, Clone)]
pub struct LlmSemanticClassifier {
    backend: OllamaBackend,
}

impl LlmSemanticClassifier {
    pub fn new(backend: OllamaBackend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl SemanticClassifier for LlmSemanticClassifier {
    async fn classify(
        &self,
        text: &str,
        candidates: &[Intent],
    ) -> Result<Option<SemanticClassification>, SemanticError> {
        if candidates.is_empty() {
            return Ok(None);
        }

        let messages = prompt::classification_messages(text, candidates);
        let reply = self.backend.chat_json(&messages).await?;
        let classification = prompt::parse_classification(&reply, candidates)?;

        if let Some(ref c) = classification {
            tracing::debug!(intent = %c.intent, confidence = c.confidence, "Semantic classification");
        }
        Ok(classification)
    }
}

/// Slot extractor backed by an Ollama chat model
#[derive(Debug, Clone)]
pub struct LlmSemanticExtractor {
    backend: OllamaBackend,
}

impl LlmSemanticExtractor {
    pub fn new(backend: OllamaBackend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl SemanticExtractor for LlmSemanticExtractor {
    async fn extract(
        &self,
        text: &str,
        intent: Intent,
        missing: &[SlotName],
    ) -> Result<ExtractedParameters, SemanticError> {
        if missing.is_empty() {
            return Ok(ExtractedParameters::new());
        }

        let messages = prompt::extraction_messages(text, intent, missing);
        let reply = self.backend.chat_json(&messages).await?;
        Ok(slots_from_reply(&reply, intent, missing))
    }
}

/// Keep only requested, schema-accepted slots whose value has the right kind
fn slots_from_reply(reply: &serde_json::Value, intent: Intent, missing: &[SlotName]) -> ExtractedParameters {
    let mut params = ExtractedParameters::new();

    for slot in missing.iter().copied().filter(|slot| intent.accepts(*slot)) {
        let Some(raw) = reply.get(slot.as_str()).filter(|v| !v.is_null()) else {
            continue;
        };
        match SlotValue::from_json(slot, raw) {
            Some(value) => params.insert(slot, value, Provenance::Semantic),
            None => tracing::debug!(slot = %slot, value = %raw, "Discarding ill-typed semantic value"),
        }
    }

    params
}

/// Classifier used when semantic help is disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSemanticClassifier;

#[async_trait]
impl SemanticClassifier for NoopSemanticClassifier {
    async fn classify(
        &self,
        _text: &str,
        _candidates: &[Intent],
    ) -> Result<Option<SemanticClassification>, SemanticError> {
        Ok(None)
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Extractor used when semantic help is disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSemanticExtractor;

#[async_trait]
impl SemanticExtractor for NoopSemanticExtractor {
    async fn extract(
        &self,
        _text: &str,
        _intent: Intent,
        _missing: &[SlotName],
    ) -> Result<ExtractedParameters, SemanticError> {
        Ok(ExtractedParameters::new())
    }

    fn is_available(&self) -> bool {
        false
    }
}
