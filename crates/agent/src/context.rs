//! Conversation context store
//!
//! Bounded recency memory of the entities a conversation has mentioned.
//! Used for anaphora ("the same buyer", "le même") and to propose values for
//! missing slots. Every list is most-recent-first and capped per kind; a
//! value re-mentioned inside the dedup window is not stored twice.

use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::{DateTime, Utc};
use farmhand_config::ContextConfig;
use farmhand_core::{ExtractedParameters, Intent, Provenance, SlotName, SlotValue, Utterance};
use farmhand_text_processing::{fold, SlotExtractor};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Kind of entity tracked in context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Buyer,
    Animal,
    Amount,
    Date,
    Category,
    Veterinarian,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Buyer,
        EntityKind::Animal,
        EntityKind::Amount,
        EntityKind::Date,
        EntityKind::Category,
        EntityKind::Veterinarian,
    ];

    /// Slot this kind fills
    pub fn slot(&self) -> SlotName {
        match self {
            EntityKind::Buyer => SlotName::Buyer,
            EntityKind::Animal => SlotName::AnimalCode,
            EntityKind::Amount => SlotName::Amount,
            EntityKind::Date => SlotName::Date,
            EntityKind::Category => SlotName::Category,
            EntityKind::Veterinarian => SlotName::Veterinarian,
        }
    }

    pub fn for_slot(slot: SlotName) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.slot() == slot)
    }
}

/// Where a remembered entity came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntitySource {
    /// Lightweight extraction on the raw utterance
    Utterance,
    /// A slot of a resolved action
    Resolution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntity {
    pub kind: EntityKind,
    pub value: SlotValue,
    pub mentioned_at: DateTime<Utc>,
    pub source: EntitySource,
}

/// One user turn, annotated once its action is resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub text: String,
    pub at: DateTime<Utc>,
    #[serde(default)]
    pub intent: Option<Intent>,
    #[serde(default)]
    pub parameters: Option<ExtractedParameters>,
}

/// Read-only snapshot handed to the clarification engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionContext {
    /// Recent turn texts, oldest first
    pub recent_turns: Vec<String>,
    /// Most recent value per kind
    pub last: BTreeMap<EntityKind, SlotValue>,
    /// Recency list per kind, most recent first
    pub recent: BTreeMap<EntityKind, Vec<SlotValue>>,
}

impl ExtractionContext {
    pub fn last(&self, kind: EntityKind) -> Option<&SlotValue> {
        self.last.get(&kind)
    }

    pub fn recent(&self, kind: EntityKind) -> &[SlotValue] {
        self.recent.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// "the same one", "le même", "celui-là": any kind
static GENERIC_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:the\s+same(?:\s+one)?|same\s+one|that\s+one|le\s+meme|la\s+meme|les\s+memes|celui[\s-]*la|celle[\s-]*la|pareil)\b",
    )
    .unwrap()
});

static KIND_REFERENCES: Lazy<Vec<(EntityKind, Regex)>> = Lazy::new(|| {
    vec![
        (
            EntityKind::Buyer,
            Regex::new(r"\b(?:same\s+(?:buyer|client|customer)|meme\s+(?:acheteur|acheteuse|client))\b")
                .unwrap(),
        ),
        (
            EntityKind::Animal,
            Regex::new(r"\b(?:same\s+(?:animal|pig|sow)|meme\s+(?:animal|porc|cochon|truie))\b")
                .unwrap(),
        ),
        (
            EntityKind::Amount,
            Regex::new(r"\b(?:same\s+(?:amount|price)|meme\s+(?:montant|prix))\b").unwrap(),
        ),
        (
            EntityKind::Veterinarian,
            Regex::new(
                r"\b(?:same\s+(?:vet|veterinarian|doctor)|meme\s+(?:veto|veterinaire|docteur))\b",
            )
            .unwrap(),
        ),
    ]
});

/// Per-conversation entity memory
#[derive(Debug, Clone)]
pub struct ConversationContextStore {
    config: ContextConfig,
    extractor: SlotExtractor,
    entities: HashMap<EntityKind, VecDeque<ContextEntity>>,
    turns: VecDeque<TurnRecord>,
}

impl Default for ConversationContextStore {
    fn default() -> Self {
        Self::new(ContextConfig::default())
    }
}

impl ConversationContextStore {
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config,
            extractor: SlotExtractor::new(),
            entities: HashMap::new(),
            turns: VecDeque::new(),
        }
    }

    /// Record a user turn and remember the amount, buyer and animal code it mentions
    pub fn update_from_utterance(&mut self, utterance: &Utterance) {
        let at = utterance.timestamp;
        let text = &utterance.text;

        if let Some(amount) = self.extractor.extract_amount(text) {
            self.remember(EntityKind::Amount, SlotValue::Number(amount), at, EntitySource::Utterance);
        }
        if let Some(buyer) = self.extractor.extract_buyer(text) {
            self.remember(EntityKind::Buyer, SlotValue::Text(buyer), at, EntitySource::Utterance);
        }
        if let Some(code) = self.extractor.extract_animal_code(text) {
            self.remember(EntityKind::Animal, SlotValue::Code(code), at, EntitySource::Utterance);
        }

        self.turns.push_back(TurnRecord {
            text: text.clone(),
            at,
            intent: None,
            parameters: None,
        });
        while self.turns.len() > self.config.max_turns {
            self.turns.pop_front();
        }
    }

    /// Annotate the latest turn with its resolved action and remember its slots
    pub fn record_resolution(&mut self, intent: Intent, params: &ExtractedParameters, at: DateTime<Utc>) {
        if let Some(turn) = self.turns.back_mut() {
            turn.intent = Some(intent);
            turn.parameters = Some(params.clone());
        }

        for (slot, value) in params.iter() {
            // Defaulted dates say nothing about the conversation
            if value.provenance == Provenance::Default {
                continue;
            }
            if let Some(kind) = EntityKind::for_slot(slot) {
                self.remember(kind, value.value.clone(), at, EntitySource::Resolution);
            }
        }
    }

    /// Push `value` to the front of its kind's list.
    ///
    /// Returns false when the same value was mentioned within the dedup window.
    pub fn remember(
        &mut self,
        kind: EntityKind,
        value: SlotValue,
        at: DateTime<Utc>,
        source: EntitySource,
    ) -> bool {
        let window_ms = self.config.dedup_window_secs * 1000;
        let capacity = self.config.per_type_capacity;
        let list = self.entities.entry(kind).or_default();

        let duplicate = list
            .iter()
            .any(|e| e.value == value && (at - e.mentioned_at).num_milliseconds().abs() < window_ms);
        if duplicate {
            return false;
        }

        list.push_front(ContextEntity {
            kind,
            value,
            mentioned_at: at,
            source,
        });
        list.truncate(capacity);
        true
    }

    /// Most recent entity of `kind` when `text` refers back to one.
    ///
    /// A kind-specific phrase ("same buyer") only resolves its own kind; a
    /// generic one ("celui-là") resolves any kind.
    pub fn resolve_reference(&self, text: &str, kind: EntityKind) -> Option<&SlotValue> {
        let folded = fold(text);
        let specific: Vec<EntityKind> = KIND_REFERENCES
            .iter()
            .filter(|(_, regex)| regex.is_match(&folded))
            .map(|(k, _)| *k)
            .collect();

        let refers = if specific.is_empty() {
            GENERIC_REFERENCE.is_match(&folded)
        } else {
            specific.contains(&kind)
        };

        if refers {
            self.last(kind)
        } else {
            None
        }
    }

    /// True when `text` names `kind` explicitly ("same buyer", "même porc")
    pub fn mentions_kind(text: &str, kind: EntityKind) -> bool {
        let folded = fold(text);
        KIND_REFERENCES
            .iter()
            .any(|(k, regex)| *k == kind && regex.is_match(&folded))
    }

    pub fn last(&self, kind: EntityKind) -> Option<&SlotValue> {
        self.entities
            .get(&kind)
            .and_then(|list| list.front())
            .map(|e| &e.value)
    }

    pub fn last_buyer(&self) -> Option<&str> {
        self.last(EntityKind::Buyer).and_then(SlotValue::as_text)
    }

    pub fn last_animal_code(&self) -> Option<&str> {
        self.last(EntityKind::Animal).and_then(SlotValue::as_text)
    }

    pub fn last_amount(&self) -> Option<f64> {
        self.last(EntityKind::Amount).and_then(SlotValue::as_number)
    }

    /// Entities of `kind`, most recent first
    pub fn entities(&self, kind: EntityKind) -> impl Iterator<Item = &ContextEntity> {
        self.entities.get(&kind).into_iter().flatten()
    }

    pub fn turns(&self) -> impl Iterator<Item = &TurnRecord> {
        self.turns.iter()
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    pub fn extraction_context(&self) -> ExtractionContext {
        let mut context = ExtractionContext {
            recent_turns: self.turns.iter().map(|t| t.text.clone()).collect(),
            ..ExtractionContext::default()
        };

        for (kind, list) in &self.entities {
            if let Some(front) = list.front() {
                context.last.insert(*kind, front.value.clone());
            }
            context
                .recent
                .insert(*kind, list.iter().map(|e| e.value.clone()).collect());
        }

        context
    }

    pub fn clear(&mut self) {
        self.entities.clear();
        self.turns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use farmhand_core::ConversationId;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn utterance(text: &str, secs: i64) -> Utterance {
        Utterance::at(ConversationId::new("c1"), text, at(secs))
    }

    #[test]
    fn test_update_tracks_buyer_amount_and_code() {
        let mut store = ConversationContextStore::default();
        store.update_from_utterance(&utterance("I sold P001 to Jean for 800000", 0));

        assert_eq!(store.last_buyer(), Some("Jean"));
        assert_eq!(store.last_amount(), Some(800_000.0));
        assert_eq!(store.last_animal_code(), Some("P001"));
        assert_eq!(store.turn_count(), 1);
    }

    #[test]
    fn test_recency_list_is_capped() {
        let mut store = ConversationContextStore::default();
        for i in 0..11 {
            let code = SlotValue::Code(format!("P{:03}", i));
            assert!(store.remember(EntityKind::Animal, code, at(i * 120), EntitySource::Utterance));
        }

        let codes: Vec<_> = store.entities(EntityKind::Animal).collect();
        assert_eq!(codes.len(), 10);
        assert_eq!(codes[0].value, SlotValue::Code("P010".into()));
        assert!(codes.iter().all(|e| e.value != SlotValue::Code("P000".into())));
    }

    #[test]
    fn test_duplicate_within_window_is_suppressed() {
        let mut store = ConversationContextStore::default();
        let jean = SlotValue::Text("Jean".into());

        assert!(store.remember(EntityKind::Buyer, jean.clone(), at(0), EntitySource::Utterance));
        assert!(!store.remember(EntityKind::Buyer, jean.clone(), at(59), EntitySource::Utterance));
        assert_eq!(store.entities(EntityKind::Buyer).count(), 1);

        // Outside the window it counts as a new mention
        assert!(store.remember(EntityKind::Buyer, jean, at(120), EntitySource::Utterance));
        assert_eq!(store.entities(EntityKind::Buyer).count(), 2);
    }

    #[test]
    fn test_resolve_reference() {
        let mut store = ConversationContextStore::default();
        store.update_from_utterance(&utterance("sold 3 pigs to Awa for 450000", 0));
        store.update_from_utterance(&utterance("sold 2 pigs to Koffi for 300000", 300));

        assert_eq!(
            store.resolve_reference("same buyer as before", EntityKind::Buyer),
            Some(&SlotValue::Text("Koffi".into()))
        );
        assert_eq!(
            store.resolve_reference("vendu au même client", EntityKind::Buyer),
            Some(&SlotValue::Text("Koffi".into()))
        );
        assert_eq!(
            store.resolve_reference("celui-là", EntityKind::Amount),
            Some(&SlotValue::Number(300_000.0))
        );
        assert_eq!(store.resolve_reference("the same buyer", EntityKind::Amount), None);
        assert_eq!(store.resolve_reference("sold to Jean", EntityKind::Buyer), None);
        assert!(ConversationContextStore::mentions_kind("le même acheteur", EntityKind::Buyer));
        assert!(!ConversationContextStore::mentions_kind("le même acheteur", EntityKind::Amount));
    }

    #[test]
    fn test_record_resolution_annotates_turn() {
        let mut store = ConversationContextStore::default();
        store.update_from_utterance(&utterance("weigh it", 0));

        let mut params = ExtractedParameters::new();
        params.insert(SlotName::AnimalCode, SlotValue::Code("P007".into()), Provenance::Clarification);
        params.insert(SlotName::Date, SlotValue::Date(at(0).date_naive()), Provenance::Default);
        store.record_resolution(Intent::CreateWeighing, &params, at(5));

        let turn = store.turns().last().unwrap();
        assert_eq!(turn.intent, Some(Intent::CreateWeighing));
        assert_eq!(store.last_animal_code(), Some("P007"));
        assert_eq!(store.last(EntityKind::Date), None);
    }

    #[test]
    fn test_extraction_context_snapshot() {
        let mut store = ConversationContextStore::default();
        for i in 0..60 {
            store.update_from_utterance(&utterance("hello", i * 120));
        }
        store.update_from_utterance(&utterance("sold to Jean for 800000", 9000));

        let context = store.extraction_context();
        assert_eq!(context.recent_turns.len(), 50);
        assert_eq!(context.last(EntityKind::Buyer), Some(&SlotValue::Text("Jean".into())));
        assert_eq!(context.recent(EntityKind::Amount), &[SlotValue::Number(800_000.0)]);
        assert!(context.recent(EntityKind::Veterinarian).is_empty());
    }
}
