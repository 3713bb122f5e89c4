//! Keyword rules for the intent classifier
//!
//! Keywords are concept ids from the synonym table, so one rule covers
//! every language and spelling variant of a concept.

use farmhand_core::Intent;

/// A single keyword rule
#[derive(Debug, Clone, Copy)]
pub struct IntentRule {
    pub intent: Intent,
    /// All of these must be present
    pub required: &'static [&'static str],
    /// Each present one adds to the confidence
    pub optional: &'static [&'static str],
    pub base_confidence: f64,
}

const fn rule(
    intent: Intent,
    required: &'static [&'static str],
    optional: &'static [&'static str],
    base_confidence: f64,
) -> IntentRule {
    IntentRule {
        intent,
        required,
        optional,
        base_confidence,
    }
}

/// Rule table in declaration order; ties inside a tier go to the earlier rule
pub const RULES: &[IntentRule] = &[
    // Information
    rule(Intent::GetStatistics, &["statistics"], &["pig", "animal"], 0.90),
    rule(Intent::GetStatistics, &["count", "pig"], &[], 0.85),
    rule(Intent::GetStatistics, &["count", "animal"], &[], 0.85),
    rule(Intent::GetStockStatus, &["stock"], &["feed"], 0.85),
    rule(Intent::GetStockStatus, &["feed", "left"], &[], 0.80),
    rule(Intent::CalculateCosts, &["cost", "total"], &[], 0.85),
    rule(Intent::CalculateCosts, &["spend", "total"], &[], 0.85),
    rule(Intent::CalculateCosts, &["calculate", "cost"], &[], 0.85),
    rule(Intent::GetReminders, &["reminder"], &["vaccinate", "treat"], 0.85),
    rule(Intent::AnalyzeData, &["analyze"], &["pig", "money"], 0.85),
    // Creation
    rule(Intent::CreateSale, &["sell"], &["pig", "piglet", "money"], 0.85),
    rule(Intent::CreateExpense, &["spend"], &["money", "feed", "medicine"], 0.85),
    rule(Intent::CreateExpense, &["buy"], &["feed", "medicine", "money"], 0.80),
    // Buying vaccine is a purchase, not a vaccination
    rule(Intent::CreateExpense, &["buy", "vaccinate"], &["money"], 0.90),
    rule(Intent::CreateFixedCharge, &["charge"], &["money"], 0.80),
    rule(Intent::CreateWeighing, &["weigh"], &["pig", "kilogram"], 0.85),
    rule(Intent::CreateVaccination, &["vaccinate"], &["pig", "piglet"], 0.85),
    rule(Intent::CreateVetVisit, &["vet"], &["visit", "pig"], 0.80),
    rule(Intent::CreateTreatment, &["treat"], &["medicine", "pig"], 0.80),
    rule(Intent::CreateDisease, &["disease"], &["pig"], 0.80),
    rule(Intent::DeleteRecord, &["delete"], &["sell", "spend", "weigh", "vaccinate"], 0.85),
    // Search
    rule(Intent::SearchAnimal, &["search", "pig"], &[], 0.80),
    rule(Intent::SearchAnimal, &["search", "animal"], &[], 0.80),
    rule(Intent::SearchBatch, &["search", "batch"], &[], 0.80),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalization::vocabulary::SYNONYM_GROUPS;

    #[test]
    fn test_rule_keywords_are_concept_ids() {
        let ids: Vec<&str> = SYNONYM_GROUPS.iter().map(|(id, _)| *id).collect();
        for rule in RULES {
            for keyword in rule.required.iter().chain(rule.optional.iter()) {
                assert!(ids.contains(keyword), "{} is not a concept id", keyword);
            }
        }
    }

    #[test]
    fn test_every_intent_has_a_rule() {
        for intent in Intent::ALL {
            assert!(RULES.iter().any(|r| r.intent == intent), "no rule for {}", intent);
        }
    }

    #[test]
    fn test_base_confidence_in_range() {
        for rule in RULES {
            assert!(rule.base_confidence > 0.0 && rule.base_confidence <= 0.95);
            assert!(!rule.required.is_empty());
        }
    }
}
