//! Clarification engine
//!
//! Decides whether an action can proceed, and if not, what to ask. Values
//! from context or the domain snapshot are offered as suggestions; they are
//! never applied without the user accepting them.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use farmhand_config::ClarificationConfig;
use farmhand_core::{
    ClarificationPrompt, DomainSnapshot, ExtractedParameters, Intent, Provenance, SchemaViolation,
    SlotName, SlotValue, Suggestion,
};
use serde::{Deserialize, Serialize};

use crate::context::{EntityKind, ExtractionContext};
use crate::messages::{display_value, join_labels, slot_label};

/// Outcome of analysing one candidate action
#[derive(Debug, Clone, PartialEq)]
pub struct ClarificationResult {
    pub needs_clarification: bool,
    /// Parameters with ill-typed or foreign slots removed
    pub parameters: ExtractedParameters,
    pub missing_slots: Vec<SlotName>,
    /// True when at least one missing slot has a suggestion
    pub can_use_context: bool,
    pub suggestions: Vec<Suggestion>,
    pub prompt: Option<ClarificationPrompt>,
    pub discarded: Vec<SchemaViolation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarificationRecord {
    pub intent: Intent,
    pub missing_slots: Vec<SlotName>,
    pub at: DateTime<Utc>,
    pub resolved: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequentClarification {
    pub intent: Intent,
    pub slot: SlotName,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct ClarificationEngine {
    history_limit: usize,
    history: VecDeque<ClarificationRecord>,
}

impl Default for ClarificationEngine {
    fn default() -> Self {
        Self::new(&ClarificationConfig::default())
    }
}

impl ClarificationEngine {
    pub fn new(config: &ClarificationConfig) -> Self {
        Self {
            history_limit: config.history_limit,
            history: VecDeque::new(),
        }
    }

    pub fn analyze(
        &self,
        intent: Intent,
        params: &ExtractedParameters,
        context: &ExtractionContext,
        snapshot: &DomainSnapshot,
    ) -> ClarificationResult {
        let discarded = intent.schema_violations(params);
        let mut parameters = params.clone();
        for violation in &discarded {
            tracing::warn!(%intent, slot = %violation.slot(), ?violation, "Discarding slot outside schema");
            parameters.remove(violation.slot());
        }

        let missing_slots = intent.missing_slots(&parameters);
        if missing_slots.is_empty() {
            return ClarificationResult {
                needs_clarification: false,
                parameters,
                missing_slots,
                can_use_context: false,
                suggestions: Vec::new(),
                prompt: None,
                discarded,
            };
        }

        let suggestions: Vec<Suggestion> = missing_slots
            .iter()
            .filter_map(|slot| suggest(*slot, context, snapshot))
            .collect();
        let can_use_context = !suggestions.is_empty();

        let prompt = ClarificationPrompt {
            question: build_question(intent, &missing_slots, &suggestions),
            missing_slots: missing_slots.clone(),
            suggestions: suggestions.clone(),
            examples: build_examples(intent, &missing_slots),
        };

        ClarificationResult {
            needs_clarification: true,
            parameters,
            missing_slots,
            can_use_context,
            suggestions,
            prompt: Some(prompt),
            discarded,
        }
    }

    /// Fill unset slots from accepted suggestions
    pub fn resolve_with_context(
        &self,
        params: &ExtractedParameters,
        suggestions: &[Suggestion],
    ) -> ExtractedParameters {
        let mut resolved = params.clone();
        for suggestion in suggestions {
            if resolved.insert_if_absent(suggestion.slot, suggestion.value.clone(), Provenance::Context) {
                tracing::debug!(slot = %suggestion.slot, value = %suggestion.value, "Filled slot from context");
            }
        }
        resolved
    }

    pub fn record_clarification(&mut self, intent: Intent, missing: &[SlotName], resolved: bool, at: DateTime<Utc>) {
        self.history.push_back(ClarificationRecord {
            intent,
            missing_slots: missing.to_vec(),
            at,
            resolved,
        });
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
    }

    /// Mark the latest open clarification for `intent` as answered
    pub fn mark_resolved(&mut self, intent: Intent) {
        if let Some(record) = self
            .history
            .iter_mut()
            .rev()
            .find(|r| r.intent == intent && !r.resolved)
        {
            record.resolved = true;
        }
    }

    pub fn history(&self) -> impl Iterator<Item = &ClarificationRecord> {
        self.history.iter()
    }

    /// Slot most often missing for `intent` in the recorded history
    pub fn most_frequent_missing(&self, intent: Intent) -> Option<SlotName> {
        let mut counts: HashMap<SlotName, usize> = HashMap::new();
        for record in self.history.iter().filter(|r| r.intent == intent) {
            for slot in &record.missing_slots {
                *counts.entry(*slot).or_default() += 1;
            }
        }

        // Ties go to the slot declared first
        counts
            .into_iter()
            .max_by(|(a_slot, a), (b_slot, b)| a.cmp(b).then_with(|| b_slot.cmp(a_slot)))
            .map(|(slot, _)| slot)
    }

    /// Top ten (intent, slot) pairs by how often they were missing
    pub fn frequent_clarifications(&self) -> Vec<FrequentClarification> {
        let mut counts: HashMap<(Intent, SlotName), usize> = HashMap::new();
        for record in &self.history {
            for slot in &record.missing_slots {
                *counts.entry((record.intent, *slot)).or_default() += 1;
            }
        }

        let mut frequent: Vec<FrequentClarification> = counts
            .into_iter()
            .map(|((intent, slot), count)| FrequentClarification { intent, slot, count })
            .collect();
        // Stable order for equal counts
        frequent.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.intent.as_str().cmp(b.intent.as_str()))
                .then_with(|| a.slot.cmp(&b.slot))
        });
        frequent.truncate(10);
        frequent
    }
}

fn suggest(slot: SlotName, context: &ExtractionContext, snapshot: &DomainSnapshot) -> Option<Suggestion> {
    let from_context = EntityKind::for_slot(slot).and_then(|kind| context.last(kind).cloned());

    let value = from_context.or_else(|| match slot {
        SlotName::AnimalCode => snapshot.animals.first().map(|a| SlotValue::Code(a.code.clone())),
        SlotName::Buyer => snapshot.recent_buyers.first().map(|b| SlotValue::Text(b.clone())),
        SlotName::Veterinarian => snapshot.veterinarians.first().map(|v| SlotValue::Text(v.clone())),
        _ => None,
    })?;

    Some(Suggestion {
        slot,
        label: format!("Recent {}: {}", slot_noun(slot), display_value(slot, &value)),
        value,
    })
}

fn slot_noun(slot: SlotName) -> &'static str {
    let label = slot_label(slot);
    label.strip_prefix("the ").unwrap_or(label)
}

fn build_question(intent: Intent, missing: &[SlotName], suggestions: &[Suggestion]) -> String {
    let first = missing[0];
    let suggested = suggestions.iter().find(|s| s.slot == first);

    let specific = match (intent, first) {
        (Intent::CreateSale, SlotName::Amount) => Some(match suggested {
            Some(s) => format!(
                "I need the sale amount. Should I use the recent amount, {}?",
                display_value(s.slot, &s.value)
            ),
            None => "How much was the sale, in FCFA? For example: \"800 000 FCFA\" or \"800000\"."
                .to_string(),
        }),
        (Intent::CreateExpense | Intent::CreateFixedCharge, SlotName::Amount) => Some(match suggested {
            Some(s) => format!(
                "What was the amount? Should I use the recent amount, {}?",
                display_value(s.slot, &s.value)
            ),
            None => "What was the amount? For example: \"50 000 FCFA\".".to_string(),
        }),
        (Intent::CreateWeighing, SlotName::Weight) => {
            Some("What is the weight? For example: \"45 kg\".".to_string())
        }
        (Intent::CreateWeighing, SlotName::AnimalCode) => Some(match suggested {
            Some(s) => format!("Which animal? Should I record the weighing for {}?", s.value),
            None => "Which animal did you weigh? Give its code (e.g. P001).".to_string(),
        }),
        (Intent::CreateVaccination, SlotName::AnimalCode) => Some(
            "Which animal was vaccinated? Give its code (e.g. P001).".to_string(),
        ),
        (Intent::CreateVaccination, SlotName::Vaccine) => Some(
            "Which vaccine? (e.g. Mycoplasma, Erysipelas, Parvovirus)".to_string(),
        ),
        (Intent::CreateVetVisit, SlotName::Veterinarian) => Some(match suggested {
            Some(s) => format!("Which veterinarian? Was it {} again?", s.value),
            None => "Which veterinarian came? Give their name.".to_string(),
        }),
        (Intent::CreateTreatment | Intent::CreateDisease, SlotName::AnimalCode) => {
            Some("Which animal is it? Give its code (e.g. P001).".to_string())
        }
        (Intent::DeleteRecord, SlotName::RecordId) => {
            Some("Which record should I delete? Give its ID.".to_string())
        }
        (Intent::SearchAnimal, SlotName::AnimalCode) => {
            Some("Which animal are you looking for? Give its code (e.g. P001).".to_string())
        }
        (Intent::SearchBatch, SlotName::BatchCode) => {
            Some("Which batch? Give its code (e.g. batch B12).".to_string())
        }
        _ => None,
    };

    // Specific questions only cover a single missing slot
    match specific {
        Some(question) if missing.len() == 1 => question,
        _ => {
            let labels: Vec<&str> = missing.iter().map(|s| slot_label(*s)).collect();
            format!("I need {}. Can you give me that?", join_labels(&labels))
        }
    }
}

fn build_examples(intent: Intent, missing: &[SlotName]) -> Vec<String> {
    let mut examples: Vec<&str> = Vec::new();

    for slot in missing {
        let for_slot: &[&str] = match slot {
            SlotName::Amount => &["800000", "50 000 FCFA", "5 million"],
            SlotName::Weight => &["45 kg", "102.5 kg"],
            SlotName::AnimalCode => &["P001", "P123", "animal P045"],
            SlotName::BatchCode => &["batch B12", "lot 3"],
            SlotName::RecordId => &["record R-102"],
            SlotName::Date => &["today", "yesterday", "15/01/2024"],
            SlotName::Category => &["feed", "medication", "veterinary"],
            SlotName::Vaccine => &["Mycoplasma", "Erysipelas", "Parvovirus"],
            SlotName::Veterinarian => &["Dr Kouassi"],
            _ => &[],
        };
        examples.extend_from_slice(for_slot);
    }

    let full = match intent {
        Intent::CreateSale if missing.contains(&SlotName::Amount) => {
            Some("Full example: \"Sold 5 pigs to Jean for 800 000 FCFA\"")
        }
        Intent::CreateExpense if missing.contains(&SlotName::Amount) => {
            Some("Full example: \"Feed expense 150 000 FCFA\"")
        }
        Intent::CreateWeighing => Some("Full example: \"Weigh P001, it weighs 45 kg\""),
        _ => None,
    };
    examples.extend(full);

    examples.into_iter().map(str::to_string).collect()
}
