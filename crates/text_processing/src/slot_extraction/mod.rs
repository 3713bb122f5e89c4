//! Slot value extraction
//!
//! Rule-based extraction of typed slots from a single utterance. Extractors
//! run on the folded text (lowercase, no diacritics, punctuation kept);
//! names are read from the original text because capitalisation matters.
//!
//! Only slots in the intent's schema are returned and unresolved slots are
//! omitted.
//!
//! ## Static Regex Patterns
//!
//! Patterns are compiled once using `once_cell::sync::Lazy`.

pub mod amount;
pub mod dates;
pub mod entities;
pub mod measures;

use chrono::NaiveDate;
use farmhand_core::{ExtractedParameters, Intent, Provenance, SlotName, SlotValue};

use crate::normalization::fold;

pub use amount::{amount_candidates, select_amount, AmountCandidate};
pub use dates::{blank_dates, extract_date};
pub use entities::{
    extract_animal_code, extract_batch_code, extract_buyer, extract_category, extract_frequency,
    extract_record_id, extract_vaccine, extract_veterinarian,
};
pub use measures::{extract_quantity, extract_weight};

/// Intents whose records carry a free-text description
const LABELLED_INTENTS: &[Intent] = &[
    Intent::CreateExpense,
    Intent::CreateFixedCharge,
    Intent::CreateVetVisit,
    Intent::CreateTreatment,
    Intent::CreateDisease,
    Intent::DeleteRecord,
];

/// Rule-based slot extractor
#[derive(Debug, Clone, Default)]
pub struct SlotExtractor;

impl SlotExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract the slots of `intent` from `text`.
    ///
    /// Relative dates resolve against `reference_date`, which is also the
    /// default date (provenance `Default`) for creation intents.
    pub fn extract(&self, text: &str, intent: Intent, reference_date: NaiveDate) -> ExtractedParameters {
        let folded = fold(text);
        let blanked = blank_dates(&folded);
        let mut params = ExtractedParameters::new();

        let quantity = extract_quantity(&blanked);
        let weight = extract_weight(&blanked);

        if let Some(q) = quantity {
            params.insert(SlotName::Quantity, SlotValue::Number(q as f64), Provenance::Text);
        }
        if let Some(w) = weight {
            params.insert(SlotName::Weight, SlotValue::Number(w), Provenance::Text);
        }

        if intent.accepts(SlotName::Amount) {
            let exclude: Vec<f64> = quantity.map(f64::from).into_iter().chain(weight).collect();
            if let Some(a) = select_amount(&amount_candidates(&blanked), &exclude) {
                params.insert(SlotName::Amount, SlotValue::Number(a), Provenance::Text);
            }
        }

        match extract_date(&folded, reference_date) {
            Some(date) => params.insert(SlotName::Date, SlotValue::Date(date), Provenance::Text),
            None if intent.is_creation() => params.insert(
                SlotName::Date,
                SlotValue::Date(reference_date),
                Provenance::Default,
            ),
            None => {}
        }

        if let Some(code) = extract_animal_code(&folded) {
            params.insert(SlotName::AnimalCode, SlotValue::Code(code), Provenance::Text);
        }
        if let Some(code) = extract_batch_code(&folded) {
            params.insert(SlotName::BatchCode, SlotValue::Code(code), Provenance::Text);
        }
        if let Some(id) = extract_record_id(&folded) {
            params.insert(SlotName::RecordId, SlotValue::Code(id), Provenance::Text);
        }
        if let Some(category) = extract_category(&folded) {
            params.insert(SlotName::Category, SlotValue::Category(category), Provenance::Text);
        }
        if let Some(buyer) = extract_buyer(text) {
            params.insert(SlotName::Buyer, SlotValue::Text(buyer), Provenance::Text);
        }
        if let Some(vet) = extract_veterinarian(text) {
            params.insert(SlotName::Veterinarian, SlotValue::Text(vet), Provenance::Text);
        }
        if let Some(vaccine) = extract_vaccine(&folded) {
            params.insert(SlotName::Vaccine, SlotValue::Text(vaccine), Provenance::Text);
        }
        if let Some(frequency) = extract_frequency(&folded) {
            params.insert(
                SlotName::Frequency,
                SlotValue::Text(frequency.to_string()),
                Provenance::Text,
            );
        }

        let label = text.trim();
        if LABELLED_INTENTS.contains(&intent) && !label.is_empty() {
            params.insert(SlotName::Label, SlotValue::Text(label.to_string()), Provenance::Text);
        }

        params.retain(|name, _| intent.accepts(name));

        tracing::debug!(
            %intent,
            slots = ?params.names().collect::<Vec<_>>(),
            "Extracted slots"
        );

        params
    }

    /// Amount alone, for context tracking
    pub fn extract_amount(&self, text: &str) -> Option<f64> {
        let blanked = blank_dates(&fold(text));
        let exclude: Vec<f64> = extract_quantity(&blanked)
            .map(f64::from)
            .into_iter()
            .chain(extract_weight(&blanked))
            .collect();
        select_amount(&amount_candidates(&blanked), &exclude)
    }

    /// Buyer alone, for context tracking
    pub fn extract_buyer(&self, text: &str) -> Option<String> {
        extract_buyer(text)
    }

    /// Animal code alone, for context tracking
    pub fn extract_animal_code(&self, text: &str) -> Option<String> {
        extract_animal_code(&fold(text))
    }
}
