//! Typed slot values and extracted parameter maps
//!
//! Every slot has a fixed kind. A value only enters [`ExtractedParameters`]
//! together with its [`Provenance`]; unresolved slots are simply absent.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Named parameter of an intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotName {
    /// Monetary amount (FCFA)
    Amount,
    /// Head count
    Quantity,
    /// Weight in kilograms
    #[serde(rename = "weight_kg")]
    Weight,
    Date,
    AnimalCode,
    BatchCode,
    RecordId,
    Category,
    Buyer,
    Veterinarian,
    Vaccine,
    Frequency,
    /// Free-text description
    Label,
}

impl SlotName {
    pub const ALL: [SlotName; 13] = [
        SlotName::Amount,
        SlotName::Quantity,
        SlotName::Weight,
        SlotName::Date,
        SlotName::AnimalCode,
        SlotName::BatchCode,
        SlotName::RecordId,
        SlotName::Category,
        SlotName::Buyer,
        SlotName::Veterinarian,
        SlotName::Vaccine,
        SlotName::Frequency,
        SlotName::Label,
    ];

    /// Wire name, as used in JSON payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotName::Amount => "amount",
            SlotName::Quantity => "quantity",
            SlotName::Weight => "weight_kg",
            SlotName::Date => "date",
            SlotName::AnimalCode => "animal_code",
            SlotName::BatchCode => "batch_code",
            SlotName::RecordId => "record_id",
            SlotName::Category => "category",
            SlotName::Buyer => "buyer",
            SlotName::Veterinarian => "veterinarian",
            SlotName::Vaccine => "vaccine",
            SlotName::Frequency => "frequency",
            SlotName::Label => "label",
        }
    }

    /// Parse a wire name
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|slot| slot.as_str() == name)
    }

    /// The only value kind this slot accepts
    pub fn kind(&self) -> SlotKind {
        match self {
            SlotName::Amount | SlotName::Quantity | SlotName::Weight => SlotKind::Number,
            SlotName::Date => SlotKind::Date,
            SlotName::AnimalCode | SlotName::BatchCode | SlotName::RecordId => SlotKind::Code,
            SlotName::Category => SlotKind::Category,
            SlotName::Buyer
            | SlotName::Veterinarian
            | SlotName::Vaccine
            | SlotName::Frequency
            | SlotName::Label => SlotKind::Text,
        }
    }
}

impl fmt::Display for SlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value kinds a slot may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Number,
    Date,
    Code,
    Category,
    Text,
}

/// Closed vocabulary of expense/revenue categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Feed,
    Medication,
    Veterinary,
    Vaccines,
    Maintenance,
    Equipment,
    Salaries,
    PigSale,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Feed => "feed",
            Category::Medication => "medication",
            Category::Veterinary => "veterinary",
            Category::Vaccines => "vaccines",
            Category::Maintenance => "maintenance",
            Category::Equipment => "equipment",
            Category::Salaries => "salaries",
            Category::PigSale => "pig_sale",
            Category::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let category = match value.trim().to_lowercase().as_str() {
            "feed" | "alimentation" => Category::Feed,
            "medication" | "medicaments" => Category::Medication,
            "veterinary" | "veterinaire" => Category::Veterinary,
            "vaccines" | "vaccins" => Category::Vaccines,
            "maintenance" | "entretien" => Category::Maintenance,
            "equipment" | "equipements" => Category::Equipment,
            "salaries" | "salaires" => Category::Salaries,
            "pig_sale" | "vente_porc" => Category::PigSale,
            "other" | "autre" => Category::Other,
            _ => return None,
        };
        Some(category)
    }

    /// Human-readable label for messages
    pub fn label(&self) -> &'static str {
        match self {
            Category::Feed => "Feed",
            Category::Medication => "Medication",
            Category::Veterinary => "Veterinary",
            Category::Vaccines => "Vaccines",
            Category::Maintenance => "Maintenance",
            Category::Equipment => "Equipment",
            Category::Salaries => "Salaries",
            Category::PigSale => "Pig sale",
            Category::Other => "Other",
        }
    }
}

/// A typed slot value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SlotValue {
    Number(f64),
    Date(NaiveDate),
    Code(String),
    Category(Category),
    Text(String),
}

impl SlotValue {
    pub fn kind(&self) -> SlotKind {
        match self {
            SlotValue::Number(_) => SlotKind::Number,
            SlotValue::Date(_) => SlotKind::Date,
            SlotValue::Code(_) => SlotKind::Code,
            SlotValue::Category(_) => SlotKind::Category,
            SlotValue::Text(_) => SlotKind::Text,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            SlotValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            SlotValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_category(&self) -> Option<Category> {
        match self {
            SlotValue::Category(c) => Some(*c),
            _ => None,
        }
    }

    /// Text or code content
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SlotValue::Code(s) | SlotValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Parse a loosely-typed JSON value into the kind a slot expects.
    ///
    /// Used for answers coming back from the semantic extractor and for
    /// values posted over HTTP.
    pub fn from_json(slot: SlotName, value: &serde_json::Value) -> Option<Self> {
        match slot.kind() {
            SlotKind::Number => match value {
                serde_json::Value::Number(n) => n.as_f64().map(SlotValue::Number),
                serde_json::Value::String(s) => {
                    let digits: String = s.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
                    digits.parse::<f64>().ok().map(SlotValue::Number)
                }
                _ => None,
            },
            SlotKind::Date => value
                .as_str()
                .and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok())
                .map(SlotValue::Date),
            SlotKind::Code => value
                .as_str()
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .map(SlotValue::Code),
            SlotKind::Category => value.as_str().and_then(Category::parse).map(SlotValue::Category),
            SlotKind::Text => value
                .as_str()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .map(SlotValue::Text),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SlotValue::Number(n) => serde_json::json!(n),
            SlotValue::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
            SlotValue::Code(s) | SlotValue::Text(s) => serde_json::Value::String(s.clone()),
            SlotValue::Category(c) => serde_json::Value::String(c.as_str().to_string()),
        }
    }
}

impl fmt::Display for SlotValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotValue::Number(n) if n.fract() == 0.0 => write!(f, "{}", *n as i64),
            SlotValue::Number(n) => write!(f, "{}", n),
            SlotValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            SlotValue::Code(s) | SlotValue::Text(s) => f.write_str(s),
            SlotValue::Category(c) => f.write_str(c.as_str()),
        }
    }
}

/// Where a slot value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Read from the utterance itself
    Text,
    /// Filled from conversation context (anaphora or accepted suggestion)
    Context,
    /// Supplied by the user in answer to a clarification
    Clarification,
    /// Reference date of the execution context
    Default,
    /// Returned by the semantic extractor
    Semantic,
}

/// A slot value with its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub value: SlotValue,
    pub provenance: Provenance,
}

/// Partial slot map for one intent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedParameters {
    slots: BTreeMap<SlotName, Slot>,
}

impl ExtractedParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a slot
    pub fn insert(&mut self, name: SlotName, value: SlotValue, provenance: Provenance) {
        self.slots.insert(name, Slot { value, provenance });
    }

    /// Insert only when the slot is not already set. Returns true if inserted.
    pub fn insert_if_absent(
        &mut self,
        name: SlotName,
        value: SlotValue,
        provenance: Provenance,
    ) -> bool {
        if self.slots.contains_key(&name) {
            return false;
        }
        self.insert(name, value, provenance);
        true
    }

    pub fn get(&self, name: SlotName) -> Option<&Slot> {
        self.slots.get(&name)
    }

    pub fn value(&self, name: SlotName) -> Option<&SlotValue> {
        self.slots.get(&name).map(|slot| &slot.value)
    }

    pub fn contains(&self, name: SlotName) -> bool {
        self.slots.contains_key(&name)
    }

    pub fn remove(&mut self, name: SlotName) -> Option<Slot> {
        self.slots.remove(&name)
    }

    pub fn amount(&self) -> Option<f64> {
        self.value(SlotName::Amount).and_then(SlotValue::as_number)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotName, &Slot)> {
        self.slots.iter().map(|(name, slot)| (*name, slot))
    }

    pub fn names(&self) -> impl Iterator<Item = SlotName> + '_ {
        self.slots.keys().copied()
    }

    /// Copy every slot of `other` that is not yet set here
    pub fn merge_missing(&mut self, other: &ExtractedParameters) {
        for (name, slot) in other.iter() {
            self.slots.entry(name).or_insert_with(|| slot.clone());
        }
    }

    /// Keep only the slots accepted by `predicate`
    pub fn retain(&mut self, mut predicate: impl FnMut(SlotName, &Slot) -> bool) {
        self.slots.retain(|name, slot| predicate(*name, slot));
    }

    /// Flat `name -> json value` view, used for executor payloads
    pub fn to_json_map(&self) -> serde_json::Map<String, serde_json::Value> {
        self.slots
            .iter()
            .map(|(name, slot)| (name.as_str().to_string(), slot.value.to_json()))
            .collect()
    }
}
