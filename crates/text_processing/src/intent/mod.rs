//! Rule-based intent classification
//!
//! Tiers are evaluated in order (information, creation, search). The first
//! tier with a firing rule wins; inside a tier the highest confidence wins.
//!
//! ```
//! use farmhand_core::Intent;
//! use farmhand_text_processing::{normalize, IntentClassifier};
//!
//! let classifier = IntentClassifier::new();
//! let detected = classifier.classify(&normalize("I sold 5 pigs to Jean")).unwrap();
//! assert_eq!(detected.intent, Intent::CreateSale);
//! ```

pub mod rules;

use farmhand_core::{DetectedIntent, DetectionSource, IntentTier};

use crate::normalization::{normalize, NormalizedText};
use rules::{IntentRule, RULES};

/// Confidence ceiling for rule-based matches
pub const RULE_CONFIDENCE_CEILING: f64 = 0.95;

/// Bonus per matched optional keyword
const OPTIONAL_BONUS: f64 = 0.05;

/// Keyword intent classifier
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    rules: Vec<IntentRule>,
}

impl IntentClassifier {
    pub fn new() -> Self {
        Self {
            rules: RULES.to_vec(),
        }
    }

    /// Classify normalized text. `None` means no rule fired.
    pub fn classify(&self, text: &NormalizedText) -> Option<DetectedIntent> {
        for tier in IntentTier::ORDER {
            let mut best: Option<DetectedIntent> = None;

            for rule in self.rules.iter().filter(|r| r.intent.tier() == tier) {
                let Some(candidate) = Self::evaluate(rule, text) else {
                    continue;
                };
                // Strictly greater keeps the earlier rule on ties
                if best.as_ref().map_or(true, |b| candidate.confidence > b.confidence) {
                    best = Some(candidate);
                }
            }

            if let Some(detected) = best {
                tracing::debug!(
                    intent = %detected.intent,
                    confidence = detected.confidence,
                    ?tier,
                    "Rule classifier matched"
                );
                return Some(detected);
            }
        }

        tracing::debug!(text = %text.text, "No intent rule matched");
        None
    }

    /// Normalize then classify
    pub fn classify_text(&self, text: &str) -> Option<DetectedIntent> {
        self.classify(&normalize(text))
    }

    fn evaluate(rule: &IntentRule, text: &NormalizedText) -> Option<DetectedIntent> {
        if !rule.required.iter().all(|k| text.contains(k)) {
            return None;
        }

        let matched: Vec<&str> = rule
            .optional
            .iter()
            .copied()
            .filter(|k| text.contains(k))
            .collect();

        let confidence = (rule.base_confidence + OPTIONAL_BONUS * matched.len() as f64)
            .min(RULE_CONFIDENCE_CEILING);

        let evidence = rule
            .required
            .iter()
            .copied()
            .chain(matched)
            .map(str::to_string)
            .collect();

        Some(DetectedIntent {
            intent: rule.intent,
            confidence,
            evidence,
            source: DetectionSource::Rules,
        })
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}
