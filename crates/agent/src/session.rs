//! Conversation session
//!
//! Ties the pipeline together for one conversation:
//! normalize → classify → extract → context → clarify → validate → gate → execute.
//!
//! A session carries at most one pending step across turns: either a
//! clarification waiting for the missing slots, or an action waiting for an
//! explicit yes/no. Turns are processed strictly in order; the caller holds
//! the session behind a mutex.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use farmhand_config::{ClarificationConfig, ContextConfig, GateConfig, Settings};
use farmhand_core::{
    Action, ActionExecutor, ClarificationPrompt, ConfirmationPrompt, ConversationId, DetectedIntent,
    DetectionSource, ExecutedActionResult, ExecutionContext, ExecutionError, ExtractedParameters,
    Intent, KeyValueStore, Provenance, QueuedAcknowledgement, SemanticClassification,
    SemanticClassifier, SemanticExtractor, SlotName, SlotValue, TurnOutcome, Utterance,
};
use farmhand_persistence::RetryQueue;
use farmhand_text_processing::{fold, normalize, IntentClassifier, NormalizedText, SlotExtractor};
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::clarification::ClarificationEngine;
use crate::confirmation::{ConfirmationGate, CorrectionHistory};
use crate::context::{ConversationContextStore, EntityKind};
use crate::messages;
use crate::validation;
use crate::AgentError;

static YES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:yes|yeah|yep|y|ok|okay|sure|confirm|go ahead|oui|ouais|d'accord|vas-y|confirme|c'est bon)(?:\s+(?:please|merci))?[\s.!]*$",
    )
    .unwrap()
});

static NO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:no|nope|cancel|stop|non|annule|laisse tomber)(?:\s+(?:thanks|merci))?[\s.!]*$")
        .unwrap()
});

/// `Some(true)` for a yes, `Some(false)` for a no, `None` otherwise
fn yes_no(text: &str) -> Option<bool> {
    let folded = fold(text.trim());
    if YES.is_match(&folded) {
        Some(true)
    } else if NO.is_match(&folded) {
        Some(false)
    } else {
        None
    }
}

fn corrections_key(user_id: &str) -> String {
    format!("corrections:{}", user_id)
}

/// Session tuning, usually taken from [`Settings`]
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub gate: GateConfig,
    pub context: ContextConfig,
    pub clarification: ClarificationConfig,
    pub executor_timeout: Duration,
    pub semantic_timeout: Duration,
}

impl SessionConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            gate: settings.gate.clone(),
            context: settings.context.clone(),
            clarification: settings.clarification.clone(),
            executor_timeout: settings.executor.timeout(),
            semantic_timeout: settings.semantic.timeout(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Collaborators shared by every session of the process
#[derive(Clone)]
pub struct AgentServices {
    pub executor: Arc<dyn ActionExecutor>,
    pub classifier: Arc<dyn SemanticClassifier>,
    pub extractor: Arc<dyn SemanticExtractor>,
    pub retry_queue: Arc<RetryQueue>,
    pub store: Arc<dyn KeyValueStore>,
}

/// An intent with its slots, not yet turned into an action
#[derive(Debug, Clone)]
struct Candidate {
    intent: Intent,
    confidence: f64,
    keywords: Vec<String>,
    parameters: ExtractedParameters,
}

#[derive(Debug, Clone)]
enum Pending {
    Clarification {
        candidate: Candidate,
        prompt: ClarificationPrompt,
    },
    Confirmation(Action),
}

/// One conversation's pipeline state
pub struct ConversationSession {
    id: ConversationId,
    services: AgentServices,
    config: SessionConfig,
    rules: IntentClassifier,
    extractor: SlotExtractor,
    context: ConversationContextStore,
    clarification: ClarificationEngine,
    gate: ConfirmationGate,
    pending: Option<Pending>,
    /// User whose correction history is loaded into the gate
    corrections_user: Option<String>,
}

impl ConversationSession {
    pub fn new(id: ConversationId, services: AgentServices, config: SessionConfig) -> Self {
        Self {
            id,
            services,
            rules: IntentClassifier::new(),
            extractor: SlotExtractor::new(),
            context: ConversationContextStore::new(config.context.clone()),
            clarification: ClarificationEngine::new(&config.clarification),
            gate: ConfirmationGate::new(config.gate.clone()),
            pending: None,
            corrections_user: None,
            config,
        }
    }

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    pub fn gate(&self) -> &ConfirmationGate {
        &self.gate
    }

    pub fn context(&self) -> &ConversationContextStore {
        &self.context
    }

    pub fn clarification(&self) -> &ClarificationEngine {
        &self.clarification
    }

    /// Id of the action waiting for a yes/no, if any
    pub fn pending_confirmation(&self) -> Option<Uuid> {
        match &self.pending {
            Some(Pending::Confirmation(action)) => Some(action.id),
            _ => None,
        }
    }

    pub fn has_pending_clarification(&self) -> bool {
        matches!(self.pending, Some(Pending::Clarification { .. }))
    }

    /// Process one user message
    pub async fn handle_utterance(
        &mut self,
        utterance: &Utterance,
        ctx: &ExecutionContext,
    ) -> TurnOutcome {
        self.ensure_corrections_loaded(&ctx.user_id).await;
        self.context.update_from_utterance(utterance);

        let outcome = match self.pending.take() {
            Some(Pending::Confirmation(action)) => match yes_no(&utterance.text) {
                Some(accepted) => Some(self.finish_confirmation(action, accepted, ctx).await),
                None => {
                    tracing::debug!(
                        conversation = %self.id,
                        action_id = %action.id,
                        "Pending confirmation abandoned"
                    );
                    None
                }
            },
            Some(Pending::Clarification { candidate, prompt }) => {
                self.answer_clarification(utterance, candidate, prompt, ctx).await
            }
            None => None,
        };

        let outcome = match outcome {
            Some(outcome) => outcome,
            None => self.fresh_turn(utterance, ctx).await,
        };

        tracing::info!(
            conversation = %self.id,
            outcome = outcome.kind(),
            "Turn complete"
        );
        outcome
    }

    /// Answer the pending confirmation out of band (e.g. a button press)
    pub async fn confirm(
        &mut self,
        action_id: Uuid,
        accepted: bool,
        ctx: &ExecutionContext,
    ) -> Result<TurnOutcome, AgentError> {
        match self.pending.take() {
            Some(Pending::Confirmation(action)) if action.id == action_id => {
                Ok(self.finish_confirmation(action, accepted, ctx).await)
            }
            other => {
                self.pending = other;
                Err(AgentError::NoPendingConfirmation(action_id))
            }
        }
    }

    /// Record a user correction and persist the user's correction history.
    ///
    /// Returns true when the correction tightened the gate thresholds.
    pub async fn record_correction(
        &mut self,
        user_id: &str,
        original: &str,
        corrected: &str,
        slot: Option<SlotName>,
        at: DateTime<Utc>,
    ) -> Result<bool, AgentError> {
        self.ensure_corrections_loaded(user_id).await;
        let tightened = self.gate.record_correction(original, corrected, slot, at);

        let bytes = serde_json::to_vec(&self.gate.snapshot())?;
        self.services
            .store
            .set(&corrections_key(user_id), bytes)
            .await
            .map_err(|e| AgentError::Storage(e.to_string()))?;

        Ok(tightened)
    }

    /// Forget context and any pending step. Correction history is kept.
    pub fn reset(&mut self) {
        self.context.clear();
        self.pending = None;
    }

    async fn ensure_corrections_loaded(&mut self, user_id: &str) {
        if self.corrections_user.as_deref() == Some(user_id) {
            return;
        }

        self.gate = ConfirmationGate::new(self.config.gate.clone());
        self.corrections_user = Some(user_id.to_string());

        match self.services.store.get(&corrections_key(user_id)).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<CorrectionHistory>(&bytes) {
                Ok(history) => {
                    tracing::debug!(
                        user_id,
                        corrections = history.corrections.len(),
                        "Loaded correction history"
                    );
                    self.gate.restore(history);
                }
                Err(e) => tracing::warn!(user_id, error = %e, "Correction history unreadable, ignoring"),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!(user_id, error = %e, "Failed to load correction history"),
        }
    }

    async fn fresh_turn(&mut self, utterance: &Utterance, ctx: &ExecutionContext) -> TurnOutcome {
        let text = utterance.text.as_str();
        let normalized = normalize(text);

        let Some(detected) = self.detect_intent(text, &normalized).await else {
            return TurnOutcome::Clarification(messages::not_understood());
        };

        let mut parameters = self.extractor.extract(text, detected.intent, ctx.current_date);
        self.apply_category_mappings(&mut parameters);
        self.apply_references(text, detected.intent, &mut parameters);

        let candidate = Candidate {
            intent: detected.intent,
            confidence: detected.confidence,
            keywords: normalized.keywords,
            parameters,
        };
        self.resolve(text, candidate, ctx, utterance.timestamp).await
    }

    async fn detect_intent(&self, text: &str, normalized: &NormalizedText) -> Option<DetectedIntent> {
        match self.rules.classify(normalized) {
            Some(detected) if detected.confidence >= self.gate.thresholds().medium => Some(detected),
            Some(detected) => Some(self.boost(text, detected).await),
            None => {
                let classification = self.semantic_classify(text, &Intent::ALL).await?;
                tracing::debug!(
                    intent = %classification.intent,
                    confidence = classification.confidence,
                    "Semantic classifier fallback"
                );
                Some(DetectedIntent {
                    intent: classification.intent,
                    confidence: classification.confidence.clamp(0.0, 1.0),
                    evidence: classification.reasoning.into_iter().collect(),
                    source: DetectionSource::Semantic,
                })
            }
        }
    }

    /// Raise a weak rule match when the semantic classifier agrees with it
    async fn boost(&self, text: &str, mut detected: DetectedIntent) -> DetectedIntent {
        if let Some(classification) = self.semantic_classify(text, &[detected.intent]).await {
            let confidence = classification.confidence.clamp(0.0, 1.0);
            if classification.intent == detected.intent && confidence > detected.confidence {
                tracing::debug!(
                    intent = %detected.intent,
                    from = detected.confidence,
                    to = confidence,
                    "Semantic classifier boosted rule match"
                );
                detected.confidence = confidence;
                detected.source = DetectionSource::RulesBoosted;
            }
        }
        detected
    }

    async fn semantic_classify(&self, text: &str, candidates: &[Intent]) -> Option<SemanticClassification> {
        let classifier = &self.services.classifier;
        if !classifier.is_available() {
            return None;
        }

        match tokio::time::timeout(self.config.semantic_timeout, classifier.classify(text, candidates)).await {
            Ok(Ok(classification)) => classification,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Semantic classifier failed");
                None
            }
            Err(_) => {
                tracing::warn!("Semantic classifier timed out");
                None
            }
        }
    }

    async fn semantic_extract(
        &self,
        text: &str,
        intent: Intent,
        missing: &[SlotName],
    ) -> Option<ExtractedParameters> {
        let extractor = &self.services.extractor;
        if !extractor.is_available() {
            return None;
        }

        match tokio::time::timeout(self.config.semantic_timeout, extractor.extract(text, intent, missing)).await {
            Ok(Ok(params)) => Some(params),
            Ok(Err(e)) => {
                tracing::warn!(%intent, error = %e, "Semantic extractor failed");
                None
            }
            Err(_) => {
                tracing::warn!(%intent, "Semantic extractor timed out");
                None
            }
        }
    }

    /// Rewrite categories the user keeps correcting
    fn apply_category_mappings(&self, parameters: &mut ExtractedParameters) {
        let mappings = self.gate.category_mappings();
        let Some(slot) = parameters.get(SlotName::Category) else {
            return;
        };
        let Some(mapped) = slot.value.as_category().and_then(|c| mappings.get(&c).copied()) else {
            return;
        };

        tracing::debug!(to = %mapped.as_str(), "Applying learned category mapping");
        let provenance = slot.provenance;
        parameters.insert(SlotName::Category, SlotValue::Category(mapped), provenance);
    }

    /// Fill unset slots that the utterance refers back to ("same buyer")
    fn apply_references(&self, text: &str, intent: Intent, parameters: &mut ExtractedParameters) {
        for kind in EntityKind::ALL {
            let slot = kind.slot();
            if !intent.accepts(slot) || parameters.contains(slot) {
                continue;
            }

            // Generic phrases only fill required slots
            let named = ConversationContextStore::mentions_kind(text, kind);
            let required = intent.required_slots().any(|s| s == slot);
            if !named && !required {
                continue;
            }

            if let Some(value) = self.context.resolve_reference(text, kind) {
                tracing::debug!(%slot, %value, "Resolved reference from context");
                parameters.insert(slot, value.clone(), Provenance::Context);
            }
        }
    }

    async fn answer_clarification(
        &mut self,
        utterance: &Utterance,
        candidate: Candidate,
        prompt: ClarificationPrompt,
        ctx: &ExecutionContext,
    ) -> Option<TurnOutcome> {
        let text = utterance.text.as_str();
        let at = utterance.timestamp;
        let answer = yes_no(text);

        if answer == Some(true) && !prompt.suggestions.is_empty() {
            let parameters = self
                .clarification
                .resolve_with_context(&candidate.parameters, &prompt.suggestions);
            self.clarification.mark_resolved(candidate.intent);
            let candidate = Candidate { parameters, ..candidate };
            return Some(self.resolve(text, candidate, ctx, at).await);
        }

        if let Some(parameters) = self.fill_from_answer(text, &candidate, &prompt.missing_slots, ctx) {
            self.clarification.mark_resolved(candidate.intent);
            let candidate = Candidate { parameters, ..candidate };
            return Some(self.resolve(text, candidate, ctx, at).await);
        }

        if answer == Some(false) {
            tracing::debug!(intent = %candidate.intent, "Clarification cancelled");
            return Some(cancelled());
        }

        if self.rules.classify_text(text).is_some() {
            tracing::debug!(intent = %candidate.intent, "Clarification abandoned for a new command");
            return None;
        }

        // Still missing: ask again
        self.pending = Some(Pending::Clarification {
            candidate,
            prompt: prompt.clone(),
        });
        Some(TurnOutcome::Clarification(prompt))
    }

    /// Slots the answer provides; `None` when it fills none of the missing ones
    fn fill_from_answer(
        &self,
        text: &str,
        candidate: &Candidate,
        missing: &[SlotName],
        ctx: &ExecutionContext,
    ) -> Option<ExtractedParameters> {
        let intent = candidate.intent;
        let answer = self.extractor.extract(text, intent, ctx.current_date);
        let mut parameters = candidate.parameters.clone();
        let mut filled = false;

        for (slot, value) in answer.iter() {
            if value.provenance == Provenance::Default {
                continue;
            }
            if missing.contains(&slot) {
                parameters.insert(slot, value.value.clone(), Provenance::Clarification);
                filled = true;
            } else if slot != SlotName::Label {
                parameters.insert_if_absent(slot, value.value.clone(), Provenance::Clarification);
            }
        }

        for slot in missing {
            if parameters.contains(*slot) {
                continue;
            }
            let Some(kind) = EntityKind::for_slot(*slot) else {
                continue;
            };
            if let Some(value) = self.context.resolve_reference(text, kind) {
                parameters.insert(*slot, value.clone(), Provenance::Context);
                filled = true;
            }
        }

        filled.then_some(parameters)
    }

    async fn resolve(
        &mut self,
        text: &str,
        mut candidate: Candidate,
        ctx: &ExecutionContext,
        at: DateTime<Utc>,
    ) -> TurnOutcome {
        let intent = candidate.intent;

        let missing = intent.missing_slots(&candidate.parameters);
        if !missing.is_empty() {
            if let Some(extra) = self.semantic_extract(text, intent, &missing).await {
                candidate.parameters.merge_missing(&extra);
            }
        }

        let analysis = self.clarification.analyze(
            intent,
            &candidate.parameters,
            &self.context.extraction_context(),
            &ctx.snapshot,
        );
        candidate.parameters = analysis.parameters;

        if let Some(prompt) = analysis.prompt {
            tracing::debug!(%intent, missing = ?analysis.missing_slots, "Asking for missing slots");
            self.clarification
                .record_clarification(intent, &analysis.missing_slots, false, at);
            self.pending = Some(Pending::Clarification {
                candidate,
                prompt: prompt.clone(),
            });
            return TurnOutcome::Clarification(prompt);
        }

        let report = validation::validate(intent, &candidate.parameters, ctx);
        if !report.is_valid() {
            let invalid = report.invalid_slots();
            tracing::info!(%intent, slots = ?invalid, "Implausible values, asking again");
            for slot in &invalid {
                candidate.parameters.remove(*slot);
            }
            let prompt = ClarificationPrompt {
                question: report.correction_question(),
                missing_slots: invalid.clone(),
                suggestions: Vec::new(),
                examples: Vec::new(),
            };
            self.clarification.record_clarification(intent, &invalid, false, at);
            self.pending = Some(Pending::Clarification {
                candidate,
                prompt: prompt.clone(),
            });
            return TurnOutcome::Clarification(prompt);
        }

        let action = Action::new(intent, candidate.parameters);
        self.context.record_resolution(intent, &action.parameters, at);

        let mut decision = self
            .gate
            .should_confirm_and_execute(&action, candidate.confidence, &candidate.keywords);

        // Unusual values are never recorded without a yes
        if !report.warnings.is_empty() {
            let ask = if decision.should_execute {
                format!("Do you want me to {}? {}", intent.describe(), messages::CONFIRM_HINT)
            } else {
                decision.message
            };
            decision.message = format!("{} {}", report.warning_text(), ask);
            decision.should_execute = false;
            decision.requires_confirmation = true;
        }
        tracing::debug!(
            %intent,
            action_id = %action.id,
            confidence = candidate.confidence,
            state = ?decision.state,
            "Gate decision"
        );

        if !decision.should_execute {
            let prompt = ConfirmationPrompt {
                action_id: action.id,
                message: decision.message,
                critical: decision.critical.is_some(),
            };
            self.pending = Some(Pending::Confirmation(action));
            return TurnOutcome::Confirmation(prompt);
        }

        self.execute(action, ctx, decision.message).await
    }

    async fn finish_confirmation(
        &mut self,
        action: Action,
        accepted: bool,
        ctx: &ExecutionContext,
    ) -> TurnOutcome {
        if !accepted {
            tracing::info!(action_id = %action.id, intent = %action.intent, "Action cancelled by user");
            return cancelled();
        }
        let acknowledgement = self.gate.acknowledgement(&action);
        self.execute(action, ctx, acknowledgement).await
    }

    async fn execute(&self, action: Action, ctx: &ExecutionContext, acknowledgement: String) -> TurnOutcome {
        let timeout = self.config.executor_timeout;
        let result = match tokio::time::timeout(timeout, self.services.executor.execute(&action, ctx)).await {
            Ok(result) => result,
            Err(_) => Err(ExecutionError::timeout(timeout.as_millis() as u64)),
        };

        match result {
            Ok(result) => {
                let message = if result.success && !acknowledgement.is_empty() {
                    acknowledgement
                } else {
                    result.message
                };
                if !result.success {
                    tracing::warn!(action_id = %action.id, intent = %action.intent, "Executor reported failure");
                }
                TurnOutcome::Executed(ExecutedActionResult {
                    success: result.success,
                    message,
                    data: result.data,
                    error: (!result.success).then(|| "action_failed".to_string()),
                })
            }
            Err(ExecutionError::Transient(reason)) => {
                tracing::warn!(
                    action_id = %action.id,
                    intent = %action.intent,
                    %reason,
                    "Transient execution failure, queueing for retry"
                );
                match self
                    .services
                    .retry_queue
                    .enqueue(action, ctx.clone(), reason)
                    .await
                {
                    Ok(queued_id) => TurnOutcome::Queued(QueuedAcknowledgement {
                        will_retry: true,
                        message: messages::QUEUED.to_string(),
                        queued_id,
                    }),
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to persist queued action");
                        failure(messages::STORAGE_UNAVAILABLE, "storage_unavailable")
                    }
                }
            }
            Err(ExecutionError::Permanent(reason)) => {
                tracing::warn!(action_id = %action.id, intent = %action.intent, %reason, "Action rejected");
                failure(messages::REJECTED, "action_rejected")
            }
        }
    }
}

fn failure(message: &str, code: &str) -> TurnOutcome {
    TurnOutcome::Executed(ExecutedActionResult {
        success: false,
        message: message.to_string(),
        data: None,
        error: Some(code.to_string()),
    })
}

fn cancelled() -> TurnOutcome {
    failure(messages::CANCELLED, "cancelled")
}
