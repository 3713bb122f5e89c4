//! Integration tests for the conversation pipeline
//!
//! Drive full sessions (utterance -> outcome) against scripted executors and
//! semantic helpers, with an in-memory store behind the retry queue.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;

use farmhand_agent::{AgentError, AgentServices, ConversationSession, SessionConfig};
use farmhand_config::{GateConfig, RetryQueueConfig};
use farmhand_core::{
    Action, ActionExecutor, ActionResult, AlwaysOnline, ConversationId, ExecutionContext,
    ExecutionError, ExtractedParameters, Intent, KeyValueStore, Provenance, SemanticClassification,
    SemanticClassifier, SemanticError, SemanticExtractor, SlotName, SlotValue, TurnOutcome,
    Utterance,
};
use farmhand_persistence::{InMemoryStore, QueuePassStatus, RetryQueue};

/// Executor that replays a script of results, then succeeds
#[derive(Default)]
struct ScriptedExecutor {
    script: Mutex<VecDeque<Result<ActionResult, ExecutionError>>>,
    calls: Mutex<Vec<Action>>,
    delay: Option<Duration>,
}

impl ScriptedExecutor {
    fn with_script(results: Vec<Result<ActionResult, ExecutionError>>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            ..Self::default()
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<Action> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ActionExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        action: &Action,
        _context: &ExecutionContext,
    ) -> Result<ActionResult, ExecutionError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().push(action.clone());
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(ActionResult::ok("done")))
    }
}

/// Classifier answering with a fixed classification
struct ScriptedClassifier {
    answer: Option<SemanticClassification>,
    seen: Mutex<Vec<Vec<Intent>>>,
}

impl ScriptedClassifier {
    fn answering(intent: Intent, confidence: f64) -> Self {
        Self {
            answer: Some(SemanticClassification {
                intent,
                confidence,
                reasoning: None,
            }),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn offline() -> Self {
        Self {
            answer: None,
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SemanticClassifier for ScriptedClassifier {
    async fn classify(
        &self,
        _text: &str,
        candidates: &[Intent],
    ) -> Result<Option<SemanticClassification>, SemanticError> {
        self.seen.lock().push(candidates.to_vec());
        Ok(self.answer.clone())
    }

    fn is_available(&self) -> bool {
        self.answer.is_some()
    }
}

struct OfflineExtractor;

#[async_trait]
impl SemanticExtractor for OfflineExtractor {
    async fn extract(
        &self,
        _text: &str,
        _intent: Intent,
        _missing: &[SlotName],
    ) -> Result<ExtractedParameters, SemanticError> {
        Err(SemanticError::Unavailable("offline".into()))
    }

    fn is_available(&self) -> bool {
        false
    }
}

struct Harness {
    executor: Arc<ScriptedExecutor>,
    classifier: Arc<ScriptedClassifier>,
    store: Arc<InMemoryStore>,
    queue: Arc<RetryQueue>,
    session: ConversationSession,
}

async fn harness_with(
    executor: ScriptedExecutor,
    classifier: ScriptedClassifier,
    config: SessionConfig,
) -> Harness {
    let executor = Arc::new(executor);
    let classifier = Arc::new(classifier);
    let store = Arc::new(InMemoryStore::new());
    let queue = Arc::new(
        RetryQueue::open(store.clone(), &RetryQueueConfig::default(), Duration::from_secs(1))
            .await
            .unwrap(),
    );

    let services = AgentServices {
        executor: executor.clone(),
        classifier: classifier.clone(),
        extractor: Arc::new(OfflineExtractor),
        retry_queue: queue.clone(),
        store: store.clone(),
    };

    Harness {
        executor,
        classifier,
        store,
        queue,
        session: ConversationSession::new(ConversationId::new("conv-1"), services, config),
    }
}

async fn harness(executor: ScriptedExecutor) -> Harness {
    harness_with(executor, ScriptedClassifier::offline(), SessionConfig::default()).await
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
}

fn ctx() -> ExecutionContext {
    ExecutionContext::new("farm-1", "user-1", today())
}

fn say(text: &str) -> Utterance {
    Utterance::new(ConversationId::new("conv-1"), text)
}

impl Harness {
    async fn say(&mut self, text: &str) -> TurnOutcome {
        self.session.handle_utterance(&say(text), &ctx()).await
    }
}

#[tokio::test]
async fn test_complete_sale_executes() {
    let mut h = harness(ScriptedExecutor::default()).await;

    let outcome = h.say("I sold 5 pigs to Jean for 800000 yesterday").await;

    let TurnOutcome::Executed(result) = outcome else {
        panic!("expected execution, got {:?}", outcome);
    };
    assert!(result.success);
    assert!(result.message.contains("800 000 FCFA"));

    let calls = h.executor.calls();
    assert_eq!(calls.len(), 1);
    let params = &calls[0].parameters;
    assert_eq!(calls[0].intent, Intent::CreateSale);
    assert_eq!(params.amount(), Some(800_000.0));
    assert_eq!(params.value(SlotName::Buyer), Some(&SlotValue::Text("Jean".into())));
    assert_eq!(
        params.value(SlotName::Date),
        Some(&SlotValue::Date(NaiveDate::from_ymd_opt(2024, 3, 14).unwrap()))
    );
}

#[tokio::test]
async fn test_missing_amount_is_clarified_then_completed() {
    let mut h = harness(ScriptedExecutor::default()).await;

    let outcome = h.say("I sold 10 pigs").await;
    let TurnOutcome::Clarification(prompt) = outcome else {
        panic!("expected clarification, got {:?}", outcome);
    };
    assert_eq!(prompt.missing_slots, vec![SlotName::Amount]);
    assert!(prompt.examples.iter().any(|e| e == "800000"));
    assert!(h.session.has_pending_clarification());
    assert!(h.executor.calls().is_empty());

    let outcome = h.say("800000").await;
    assert!(matches!(outcome, TurnOutcome::Executed(ref r) if r.success));
    assert!(!h.session.has_pending_clarification());

    let calls = h.executor.calls();
    assert_eq!(calls.len(), 1);
    let amount = calls[0].parameters.get(SlotName::Amount).unwrap();
    assert_eq!(amount.value, SlotValue::Number(800_000.0));
    assert_eq!(amount.provenance, Provenance::Clarification);
    assert_eq!(calls[0].parameters.value(SlotName::Quantity), Some(&SlotValue::Number(10.0)));

    let record = h.session.clarification().history().last().unwrap();
    assert!(record.resolved);
}

#[tokio::test]
async fn test_unhelpful_answer_asks_again() {
    let mut h = harness(ScriptedExecutor::default()).await;

    h.say("I sold 10 pigs").await;
    let outcome = h.say("hmm let me think").await;

    assert!(matches!(outcome, TurnOutcome::Clarification(ref p) if p.missing_slots == vec![SlotName::Amount]));
    assert!(h.session.has_pending_clarification());
}

#[tokio::test]
async fn test_accepting_context_suggestion() {
    let mut h = harness(ScriptedExecutor::default()).await;

    h.say("I sold 3 pigs to Awa for 450000").await;
    let outcome = h.say("I sold 2 pigs").await;

    let TurnOutcome::Clarification(prompt) = outcome else {
        panic!("expected clarification, got {:?}", outcome);
    };
    assert_eq!(prompt.suggestions.len(), 1);
    assert_eq!(prompt.suggestions[0].value, SlotValue::Number(450_000.0));
    // Suggestions are offered, never applied silently
    assert_eq!(h.executor.calls().len(), 1);

    let outcome = h.say("yes").await;
    assert!(matches!(outcome, TurnOutcome::Executed(ref r) if r.success));

    let calls = h.executor.calls();
    let amount = calls[1].parameters.get(SlotName::Amount).unwrap();
    assert_eq!(amount.value, SlotValue::Number(450_000.0));
    assert_eq!(amount.provenance, Provenance::Context);
}

#[tokio::test]
async fn test_same_buyer_reference() {
    let mut h = harness(ScriptedExecutor::default()).await;

    h.say("I sold 3 pigs to Awa for 450000").await;
    h.say("I sold 2 pigs to the same buyer for 300000").await;

    let calls = h.executor.calls();
    assert_eq!(calls.len(), 2);
    let buyer = calls[1].parameters.get(SlotName::Buyer).unwrap();
    assert_eq!(buyer.value, SlotValue::Text("Awa".into()));
    assert_eq!(buyer.provenance, Provenance::Context);
    assert_eq!(calls[1].parameters.amount(), Some(300_000.0));
}

#[tokio::test]
async fn test_large_amount_requires_confirmation() {
    let mut h = harness(ScriptedExecutor::default()).await;

    let outcome = h.say("I sold 50 pigs to Jean for 6000000").await;
    let TurnOutcome::Confirmation(prompt) = outcome else {
        panic!("expected confirmation, got {:?}", outcome);
    };
    assert!(prompt.critical);
    assert!(prompt.message.contains("6 000 000 FCFA"));
    assert_eq!(h.session.pending_confirmation(), Some(prompt.action_id));
    assert!(h.executor.calls().is_empty());

    let outcome = h.say("oui").await;
    let TurnOutcome::Executed(result) = outcome else {
        panic!("expected execution, got {:?}", outcome);
    };
    assert!(result.success);
    assert_eq!(result.message, "Recorded! Sale of 6 000 000 FCFA.");
    assert_eq!(h.executor.calls()[0].id, prompt.action_id);
    assert_eq!(h.session.pending_confirmation(), None);
}

#[tokio::test]
async fn test_declined_confirmation_cancels() {
    let mut h = harness(ScriptedExecutor::default()).await;

    h.say("I sold 50 pigs to Jean for 6000000").await;
    let outcome = h.say("no").await;

    let TurnOutcome::Executed(result) = outcome else {
        panic!("expected cancellation, got {:?}", outcome);
    };
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("cancelled"));
    assert!(h.executor.calls().is_empty());
}

#[tokio::test]
async fn test_confirm_by_action_id() {
    let mut h = harness(ScriptedExecutor::default()).await;

    let TurnOutcome::Confirmation(prompt) = h.say("delete record R-102").await else {
        panic!("expected confirmation");
    };

    let wrong = uuid::Uuid::new_v4();
    let err = h.session.confirm(wrong, true, &ctx()).await.unwrap_err();
    assert!(matches!(err, AgentError::NoPendingConfirmation(id) if id == wrong));
    assert_eq!(h.session.pending_confirmation(), Some(prompt.action_id));

    let outcome = h.session.confirm(prompt.action_id, true, &ctx()).await.unwrap();
    assert!(matches!(outcome, TurnOutcome::Executed(ref r) if r.success));
    assert_eq!(h.executor.calls()[0].intent, Intent::DeleteRecord);
}

#[tokio::test]
async fn test_transient_failure_is_queued_then_replayed() {
    let executor = ScriptedExecutor::with_script(vec![Err(ExecutionError::Transient(
        "connection refused".into(),
    ))]);
    let mut h = harness(executor).await;

    let outcome = h.say("I sold 5 pigs to Jean for 800000").await;
    let TurnOutcome::Queued(ack) = outcome else {
        panic!("expected queued, got {:?}", outcome);
    };
    assert!(ack.will_retry);

    let entries = h.queue.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, ack.queued_id);
    // The replay carries the key minted for the first attempt
    let first_attempt = &h.executor.calls()[0];
    assert_eq!(entries[0].action.idempotency_key, first_attempt.idempotency_key);

    let report = h.queue.process_queue(h.executor.as_ref(), &AlwaysOnline).await;
    assert_eq!(report.status, QueuePassStatus::Completed);
    assert_eq!(report.succeeded, 1);
    assert!(h.queue.is_empty().await);
}

#[tokio::test]
async fn test_permanent_failure_is_not_queued() {
    let executor =
        ScriptedExecutor::with_script(vec![Err(ExecutionError::Permanent("400 bad request".into()))]);
    let mut h = harness(executor).await;

    let outcome = h.say("I sold 5 pigs to Jean for 800000").await;

    let TurnOutcome::Executed(result) = outcome else {
        panic!("expected failure, got {:?}", outcome);
    };
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("action_rejected"));
    assert!(!result.message.contains("400"));
    assert!(h.queue.is_empty().await);
}

#[tokio::test]
async fn test_executor_timeout_is_transient() {
    let config = SessionConfig {
        executor_timeout: Duration::from_millis(50),
        ..SessionConfig::default()
    };
    let mut h = harness_with(
        ScriptedExecutor::slow(Duration::from_secs(10)),
        ScriptedClassifier::offline(),
        config,
    )
    .await;

    let outcome = h.say("I sold 5 pigs to Jean for 800000").await;

    assert!(matches!(outcome, TurnOutcome::Queued(_)));
    let entries = h.queue.entries().await;
    assert!(entries[0].last_error.as_deref().unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_unknown_request_gets_examples() {
    let mut h = harness(ScriptedExecutor::default()).await;

    let outcome = h.say("blah blah").await;

    let TurnOutcome::Clarification(prompt) = outcome else {
        panic!("expected clarification, got {:?}", outcome);
    };
    assert!(prompt.missing_slots.is_empty());
    assert!(!prompt.examples.is_empty());
}

#[tokio::test]
async fn test_semantic_fallback_when_no_rule_fires() {
    let mut h = harness_with(
        ScriptedExecutor::default(),
        ScriptedClassifier::answering(Intent::CreateSale, 0.82),
        SessionConfig::default(),
    )
    .await;

    let outcome = h.say("Kofi gave me 300000 for three piglets").await;

    assert!(matches!(outcome, TurnOutcome::Executed(ref r) if r.success));
    assert_eq!(h.classifier.seen.lock()[0].len(), Intent::ALL.len());
    assert_eq!(h.executor.calls()[0].parameters.amount(), Some(300_000.0));
}

#[tokio::test]
async fn test_semantic_booster_raises_weak_rule_match() {
    let config = SessionConfig {
        gate: GateConfig {
            medium_confidence: 0.92,
            ..GateConfig::default()
        },
        ..SessionConfig::default()
    };
    let mut h = harness_with(
        ScriptedExecutor::default(),
        ScriptedClassifier::answering(Intent::CreateSale, 0.97),
        config,
    )
    .await;

    let outcome = h.say("I sold 5 pigs to Jean for 800000").await;

    // Boosted above the high threshold: auto-executed with a plain acknowledgement
    let TurnOutcome::Executed(result) = outcome else {
        panic!("expected execution, got {:?}", outcome);
    };
    assert_eq!(result.message, "Recorded! Sale of 800 000 FCFA.");
    assert_eq!(h.classifier.seen.lock()[0], vec![Intent::CreateSale]);
}

#[tokio::test]
async fn test_corrections_tighten_and_persist() {
    let mut h = harness_with(
        ScriptedExecutor::default(),
        ScriptedClassifier::answering(Intent::CreateSale, 0.82),
        SessionConfig::default(),
    )
    .await;

    let start = Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap();
    let mut tightened = Vec::new();
    for day in 0..6 {
        let at = start + chrono::Duration::days(day) / 2;
        tightened.push(
            h.session
                .record_correction("user-1", &format!("{}", day), "x", Some(SlotName::Amount), at)
                .await
                .unwrap(),
        );
    }
    assert_eq!(tightened, vec![false, false, false, false, false, true]);
    let thresholds = h.session.gate().thresholds();
    assert!((thresholds.high - 0.97).abs() < 1e-9);
    assert!((thresholds.medium - 0.85).abs() < 1e-9);
    assert!(h.store.get("corrections:user-1").await.unwrap().is_some());

    // 0.82 now falls below the tightened medium threshold
    let outcome = h.say("Kofi gave me 300000 for three piglets").await;
    let TurnOutcome::Confirmation(prompt) = outcome else {
        panic!("expected confirmation, got {:?}", outcome);
    };
    assert!(!prompt.critical);
    assert!(prompt.message.contains("record a sale"));
}

#[tokio::test]
async fn test_correction_history_is_loaded_per_user() {
    let h = harness(ScriptedExecutor::default()).await;
    let services = AgentServices {
        executor: h.executor.clone(),
        classifier: h.classifier.clone(),
        extractor: Arc::new(OfflineExtractor),
        retry_queue: h.queue.clone(),
        store: h.store.clone(),
    };

    let mut first = ConversationSession::new(ConversationId::new("a"), services.clone(), SessionConfig::default());
    let now = Utc::now();
    for i in 0..6 {
        first
            .record_correction("user-1", &i.to_string(), "y", None, now)
            .await
            .unwrap();
    }

    let mut second = ConversationSession::new(ConversationId::new("b"), services, SessionConfig::default());
    second.handle_utterance(&say("hello"), &ctx()).await;
    assert!((second.gate().thresholds().high - 0.97).abs() < 1e-9);

    // Another user starts from the configured thresholds
    let other = ExecutionContext::new("farm-1", "user-2", today());
    second.handle_utterance(&say("hello"), &other).await;
    assert!((second.gate().thresholds().high - 0.95).abs() < 1e-9);
}

#[tokio::test]
async fn test_reset_drops_pending_step() {
    let mut h = harness(ScriptedExecutor::default()).await;

    h.say("I sold 10 pigs").await;
    assert!(h.session.has_pending_clarification());

    h.session.reset();
    assert!(!h.session.has_pending_clarification());
    assert_eq!(h.session.context().turn_count(), 0);
}

#[tokio::test]
async fn test_implausible_weight_is_asked_again() {
    let mut h = harness(ScriptedExecutor::default()).await;

    let outcome = h.say("Weighed P001 at 900 kg").await;
    let TurnOutcome::Clarification(prompt) = outcome else {
        panic!("expected clarification, got {:?}", outcome);
    };
    assert_eq!(prompt.missing_slots, vec![SlotName::Weight]);
    assert!(prompt.question.contains("900 kg"));
    assert!(h.executor.calls().is_empty());

    let outcome = h.say("45 kg").await;
    assert!(matches!(outcome, TurnOutcome::Executed(ref r) if r.success), "{:?}", outcome);

    let calls = h.executor.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].parameters.value(SlotName::Weight), Some(&SlotValue::Number(45.0)));
    assert_eq!(calls[0].parameters.value(SlotName::AnimalCode), Some(&SlotValue::Code("P001".into())));
}

#[tokio::test]
async fn test_unusual_amount_needs_confirmation() {
    let mut h = harness(ScriptedExecutor::default()).await;

    let outcome = h.say("I sold 5 pigs to Jean for 500").await;
    let TurnOutcome::Confirmation(prompt) = outcome else {
        panic!("expected confirmation, got {:?}", outcome);
    };
    assert!(prompt.message.contains("very small amount"));
    assert!(prompt.message.contains("Reply yes"));
    assert!(h.executor.calls().is_empty());

    let outcome = h.say("yes").await;
    assert!(matches!(outcome, TurnOutcome::Executed(ref r) if r.success));
    assert_eq!(h.executor.calls()[0].parameters.amount(), Some(500.0));
}
