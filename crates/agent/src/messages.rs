//! User-facing message helpers

use farmhand_core::{ClarificationPrompt, SlotName, SlotValue};

/// Format an amount the way farmers write it: `800 000 FCFA`
pub fn format_fcfa(amount: f64) -> String {
    format!("{} FCFA", group_thousands(amount.round() as i64))
}

fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(ch);
    }
    out
}

/// Display form of a slot value in messages
pub fn display_value(slot: SlotName, value: &SlotValue) -> String {
    match (slot, value) {
        (SlotName::Amount, SlotValue::Number(n)) => format_fcfa(*n),
        (SlotName::Weight, SlotValue::Number(n)) => format!("{} kg", value_without_zero(*n)),
        (SlotName::Category, SlotValue::Category(c)) => c.label().to_string(),
        _ => value.to_string(),
    }
}

fn value_without_zero(n: f64) -> String {
    SlotValue::Number(n).to_string()
}

/// Noun phrase for a slot, e.g. "the amount"
pub fn slot_label(slot: SlotName) -> &'static str {
    match slot {
        SlotName::Amount => "the amount",
        SlotName::Quantity => "the number of animals",
        SlotName::Weight => "the weight",
        SlotName::Date => "the date",
        SlotName::AnimalCode => "the animal",
        SlotName::BatchCode => "the batch",
        SlotName::RecordId => "the record ID",
        SlotName::Category => "the category",
        SlotName::Buyer => "the buyer",
        SlotName::Veterinarian => "the veterinarian",
        SlotName::Vaccine => "the vaccine",
        SlotName::Frequency => "the frequency",
        SlotName::Label => "a description",
    }
}

/// "a", "a and b", "a, b and c"
pub fn join_labels(labels: &[&str]) -> String {
    match labels {
        [] => String::new(),
        [one] => one.to_string(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

pub const QUEUED: &str =
    "I can't reach the farm records right now. I saved this and will retry automatically.";
pub const REJECTED: &str = "I couldn't record that: the farm records refused it. Please check the details.";
pub const STORAGE_UNAVAILABLE: &str =
    "Something went wrong while saving. Nothing was recorded, please try again in a moment.";
pub const CANCELLED: &str = "Okay, I cancelled it. Nothing was recorded.";
pub const CONFIRM_HINT: &str = "Reply yes to confirm or no to cancel.";

/// Generic clarification when no intent could be recognised
pub fn not_understood() -> ClarificationPrompt {
    ClarificationPrompt {
        question: "Sorry, I didn't understand. What would you like to do?".to_string(),
        missing_slots: Vec::new(),
        suggestions: Vec::new(),
        examples: vec![
            "I sold 5 pigs to Jean for 800000".to_string(),
            "Feed expense 150 000 FCFA".to_string(),
            "Weigh P001, it weighs 45 kg".to_string(),
            "How many pigs do I have?".to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use farmhand_core::Category;

    #[test]
    fn test_format_fcfa() {
        assert_eq!(format_fcfa(800_000.0), "800 000 FCFA");
        assert_eq!(format_fcfa(6_000_000.0), "6 000 000 FCFA");
        assert_eq!(format_fcfa(950.0), "950 FCFA");
        assert_eq!(format_fcfa(1_500.4), "1 500 FCFA");
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(SlotName::Weight, &SlotValue::Number(45.5)), "45.5 kg");
        assert_eq!(
            display_value(SlotName::Category, &SlotValue::Category(Category::Feed)),
            "Feed"
        );
        assert_eq!(display_value(SlotName::Buyer, &SlotValue::Text("Jean".into())), "Jean");
    }

    #[test]
    fn test_join_labels() {
        assert_eq!(join_labels(&["the amount"]), "the amount");
        assert_eq!(join_labels(&["the weight", "the animal"]), "the weight and the animal");
        assert_eq!(join_labels(&["a", "b", "c"]), "a, b and c");
    }
}
