//! Prompt construction for the semantic helpers
//!
//! Both prompts constrain the model to a closed answer set (intent names or
//! slot names) and a single JSON object, so the reply can be validated
//! against the core types without free-form interpretation.

use std::fmt;

use farmhand_core::{Category, Intent, SemanticClassification, SlotKind, SlotName};
use serde::{Deserialize, Serialize};

use crate::LlmError;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

const CLASSIFY_EXAMPLES: &[(&str, &str, f64)] = &[
    ("combien de porcs j'ai", "get_statistics", 0.95),
    ("j'ai vendu 5 porcs à 800000", "create_sale", 0.98),
    ("mes dépenses ce mois", "calculate_costs", 0.95),
    ("j'ai dépensé 50000 pour l'aliment", "create_expense", 0.98),
    ("peser p001 il fait 45 kg", "create_weighing", 0.98),
    ("where is pig P012", "search_animal", 0.9),
];

/// Messages asking the model to pick one of `candidates` for `text`
pub fn classification_messages(text: &str, candidates: &[Intent]) -> Vec<Message> {
    let mut system = String::from(
        "You route messages from pig farmers (English or French, possibly Ivorian French) \
         to exactly one action of a farm-management assistant.\n\nAllowed actions:\n",
    );
    for intent in candidates {
        system.push_str(&format!("- {}: {}\n", intent.as_str(), intent.describe()));
    }
    system.push_str(
        "\nRules:\n\
         - Answer with one allowed action name, never invent one.\n\
         - If the message matches none of them, answer \"none\".\n\
         - If it is genuinely ambiguous, use a confidence between 0.6 and 0.7.\n\nExamples:\n",
    );
    for (example, intent, confidence) in CLASSIFY_EXAMPLES {
        system.push_str(&format!(
            "- \"{}\" -> {{\"intent\": \"{}\", \"confidence\": {}}}\n",
            example, intent, confidence
        ));
    }
    system.push_str(
        "\nReply with ONLY a JSON object: \
         {\"intent\": \"<action>\", \"confidence\": <0.0-1.0>, \"reasoning\": \"<short>\"}",
    );

    vec![Message::system(system), Message::user(text)]
}

/// Messages asking the model to fill `missing` slots of `intent`
pub fn extraction_messages(text: &str, intent: Intent, missing: &[SlotName]) -> Vec<Message> {
    let mut system = format!(
        "Extract parameters for the action \"{}\" ({}) from a pig farmer's message.\n\n\
         Fields to extract:\n",
        intent.as_str(),
        intent.describe()
    );
    for slot in missing {
        system.push_str(&format!("- {}: {}\n", slot.as_str(), slot_format(*slot)));
    }
    system.push_str(
        "\nRules:\n\
         - Only use information stated in the message; never guess.\n\
         - Omit a field (or use null) when the message does not contain it.\n\
         - Amounts are in FCFA; \"k\" and \"balles\" mean thousands.\n\n\
         Reply with ONLY a JSON object whose keys are the field names above.",
    );

    vec![Message::system(system), Message::user(text)]
}

fn slot_format(slot: SlotName) -> String {
    match slot.kind() {
        SlotKind::Number => match slot {
            SlotName::Quantity => "integer head count".to_string(),
            SlotName::Weight => "number, kilograms".to_string(),
            _ => "number, no currency or separators".to_string(),
        },
        SlotKind::Date => "date as YYYY-MM-DD".to_string(),
        SlotKind::Code => "identifier such as P001 or LOT-3".to_string(),
        SlotKind::Category => {
            let all = [
                Category::Feed,
                Category::Medication,
                Category::Veterinary,
                Category::Vaccines,
                Category::Maintenance,
                Category::Equipment,
                Category::Salaries,
                Category::PigSale,
                Category::Other,
            ];
            let names: Vec<&str> = all.iter().map(Category::as_str).collect();
            format!("one of {}", names.join(", "))
        }
        SlotKind::Text => "short text".to_string(),
    }
}

/// Validate a classification reply against the allowed candidates.
///
/// `Ok(None)` means the model abstained or named an intent outside the
/// candidate set.
pub fn parse_classification(
    value: &serde_json::Value,
    candidates: &[Intent],
) -> Result<Option<SemanticClassification>, LlmError> {
    let name = value
        .get("intent")
        .or_else(|| value.get("action"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| LlmError::InvalidResponse("missing \"intent\" field".to_string()))?;

    let intent = match name.parse::<Intent>() {
        Ok(intent) if candidates.contains(&intent) => intent,
        _ => {
            tracing::debug!(intent = name, "Semantic classifier answered outside candidates");
            return Ok(None);
        }
    };

    let confidence = value
        .get("confidence")
        .and_then(|v| v.as_f64())
        .filter(|c| c.is_finite())
        .unwrap_or(0.8)
        .clamp(0.0, 1.0);

    let reasoning = value
        .get("reasoning")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    Ok(Some(SemanticClassification {
        intent,
        confidence,
        reasoning,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classification_prompt_lists_candidates_only() {
        let messages =
            classification_messages("j'ai vendu", &[Intent::CreateSale, Intent::CreateExpense]);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("- create_sale: record a sale"));
        assert!(!messages[0].content.contains("- delete_record"));
        assert_eq!(messages[1].content, "j'ai vendu");
    }

    #[test]
    fn test_extraction_prompt_names_missing_slots() {
        let messages =
            extraction_messages("vendu à Jean", Intent::CreateSale, &[SlotName::Amount, SlotName::Date]);

        let system = &messages[0].content;
        assert!(system.contains("create_sale"));
        assert!(system.contains("- amount: number"));
        assert!(system.contains("- date: date as YYYY-MM-DD"));
        assert!(!system.contains("- buyer"));
    }

    #[test]
    fn test_category_format_lists_vocabulary() {
        let format = slot_format(SlotName::Category);
        assert!(format.contains("feed"));
        assert!(format.contains("pig_sale"));
    }

    #[test]
    fn test_parse_classification() {
        let candidates = [Intent::CreateSale, Intent::GetStatistics];

        let parsed = parse_classification(
            &json!({"intent": "create_sale", "confidence": 0.92, "reasoning": "sold pigs"}),
            &candidates,
        )
        .unwrap()
        .unwrap();
        assert_eq!(parsed.intent, Intent::CreateSale);
        assert_eq!(parsed.confidence, 0.92);
        assert_eq!(parsed.reasoning.as_deref(), Some("sold pigs"));

        // Outside the candidate set, or abstained
        assert!(parse_classification(&json!({"intent": "delete_record"}), &candidates)
            .unwrap()
            .is_none());
        assert!(parse_classification(&json!({"intent": "none"}), &candidates)
            .unwrap()
            .is_none());

        assert!(parse_classification(&json!({"confidence": 0.9}), &candidates).is_err());
    }

    #[test]
    fn test_parse_classification_clamps_confidence() {
        let parsed = parse_classification(
            &json!({"action": "get_statistics", "confidence": 7}),
            &[Intent::GetStatistics],
        )
        .unwrap()
        .unwrap();
        assert_eq!(parsed.confidence, 1.0);
    }
}
