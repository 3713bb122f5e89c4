//! Intents and their fixed slot schemas

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::slots::{ExtractedParameters, SlotKind, SlotName};

/// Priority tier an intent is classified in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentTier {
    Information,
    Creation,
    Search,
}

impl IntentTier {
    /// Evaluation order for the rule classifier
    pub const ORDER: [IntentTier; 3] =
        [IntentTier::Information, IntentTier::Creation, IntentTier::Search];
}

/// A recognised action type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    GetStatistics,
    GetStockStatus,
    CalculateCosts,
    GetReminders,
    AnalyzeData,
    CreateSale,
    CreateExpense,
    CreateFixedCharge,
    CreateWeighing,
    CreateVaccination,
    CreateVetVisit,
    CreateTreatment,
    CreateDisease,
    DeleteRecord,
    SearchAnimal,
    SearchBatch,
}

/// One entry of an intent's slot schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotSpec {
    pub name: SlotName,
    pub required: bool,
}

impl SlotSpec {
    const fn required(name: SlotName) -> Self {
        Self { name, required: true }
    }

    const fn optional(name: SlotName) -> Self {
        Self { name, required: false }
    }

    pub fn kind(&self) -> SlotKind {
        self.name.kind()
    }
}

use SlotName::*;

const INFO_SCHEMA: &[SlotSpec] = &[SlotSpec::optional(Date)];
const SALE_SCHEMA: &[SlotSpec] = &[
    SlotSpec::required(Amount),
    SlotSpec::optional(Quantity),
    SlotSpec::optional(Weight),
    SlotSpec::optional(Buyer),
    SlotSpec::optional(Date),
    SlotSpec::optional(AnimalCode),
];
const EXPENSE_SCHEMA: &[SlotSpec] = &[
    SlotSpec::required(Amount),
    SlotSpec::optional(Category),
    SlotSpec::optional(Date),
    SlotSpec::optional(Label),
];
const FIXED_CHARGE_SCHEMA: &[SlotSpec] = &[
    SlotSpec::required(Amount),
    SlotSpec::optional(Category),
    SlotSpec::optional(Frequency),
    SlotSpec::optional(Date),
    SlotSpec::optional(Label),
];
const WEIGHING_SCHEMA: &[SlotSpec] = &[
    SlotSpec::required(Weight),
    SlotSpec::required(AnimalCode),
    SlotSpec::optional(Date),
];
const VACCINATION_SCHEMA: &[SlotSpec] = &[
    SlotSpec::required(AnimalCode),
    SlotSpec::required(Vaccine),
    SlotSpec::optional(Date),
];
const VET_VISIT_SCHEMA: &[SlotSpec] = &[
    SlotSpec::required(Veterinarian),
    SlotSpec::optional(Date),
    SlotSpec::optional(Label),
];
const HEALTH_RECORD_SCHEMA: &[SlotSpec] = &[
    SlotSpec::required(AnimalCode),
    SlotSpec::optional(Date),
    SlotSpec::optional(Label),
];
const DELETE_SCHEMA: &[SlotSpec] = &[SlotSpec::required(RecordId), SlotSpec::optional(Label)];
const SEARCH_ANIMAL_SCHEMA: &[SlotSpec] = &[SlotSpec::required(AnimalCode)];
const SEARCH_BATCH_SCHEMA: &[SlotSpec] = &[SlotSpec::required(BatchCode)];

impl Intent {
    pub const ALL: [Intent; 16] = [
        Intent::GetStatistics,
        Intent::GetStockStatus,
        Intent::CalculateCosts,
        Intent::GetReminders,
        Intent::AnalyzeData,
        Intent::CreateSale,
        Intent::CreateExpense,
        Intent::CreateFixedCharge,
        Intent::CreateWeighing,
        Intent::CreateVaccination,
        Intent::CreateVetVisit,
        Intent::CreateTreatment,
        Intent::CreateDisease,
        Intent::DeleteRecord,
        Intent::SearchAnimal,
        Intent::SearchBatch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::GetStatistics => "get_statistics",
            Intent::GetStockStatus => "get_stock_status",
            Intent::CalculateCosts => "calculate_costs",
            Intent::GetReminders => "get_reminders",
            Intent::AnalyzeData => "analyze_data",
            Intent::CreateSale => "create_sale",
            Intent::CreateExpense => "create_expense",
            Intent::CreateFixedCharge => "create_fixed_charge",
            Intent::CreateWeighing => "create_weighing",
            Intent::CreateVaccination => "create_vaccination",
            Intent::CreateVetVisit => "create_vet_visit",
            Intent::CreateTreatment => "create_treatment",
            Intent::CreateDisease => "create_disease",
            Intent::DeleteRecord => "delete_record",
            Intent::SearchAnimal => "search_animal",
            Intent::SearchBatch => "search_batch",
        }
    }

    pub fn tier(&self) -> IntentTier {
        match self {
            Intent::GetStatistics
            | Intent::GetStockStatus
            | Intent::CalculateCosts
            | Intent::GetReminders
            | Intent::AnalyzeData => IntentTier::Information,
            Intent::SearchAnimal | Intent::SearchBatch => IntentTier::Search,
            _ => IntentTier::Creation,
        }
    }

    /// Intents that write to the farm records
    pub fn is_creation(&self) -> bool {
        self.tier() == IntentTier::Creation
    }

    /// Intents that only read data
    pub fn is_read_only(&self) -> bool {
        !self.is_creation()
    }

    /// Intents that destroy data
    pub fn is_destructive(&self) -> bool {
        matches!(self, Intent::DeleteRecord)
    }

    pub fn schema(&self) -> &'static [SlotSpec] {
        match self {
            Intent::GetStatistics
            | Intent::GetStockStatus
            | Intent::CalculateCosts
            | Intent::GetReminders
            | Intent::AnalyzeData => INFO_SCHEMA,
            Intent::CreateSale => SALE_SCHEMA,
            Intent::CreateExpense => EXPENSE_SCHEMA,
            Intent::CreateFixedCharge => FIXED_CHARGE_SCHEMA,
            Intent::CreateWeighing => WEIGHING_SCHEMA,
            Intent::CreateVaccination => VACCINATION_SCHEMA,
            Intent::CreateVetVisit => VET_VISIT_SCHEMA,
            Intent::CreateTreatment | Intent::CreateDisease => HEALTH_RECORD_SCHEMA,
            Intent::DeleteRecord => DELETE_SCHEMA,
            Intent::SearchAnimal => SEARCH_ANIMAL_SCHEMA,
            Intent::SearchBatch => SEARCH_BATCH_SCHEMA,
        }
    }

    pub fn required_slots(&self) -> impl Iterator<Item = SlotName> {
        self.schema().iter().filter(|spec| spec.required).map(|spec| spec.name)
    }

    pub fn accepts(&self, slot: SlotName) -> bool {
        self.schema().iter().any(|spec| spec.name == slot)
    }

    /// Required slots not present in `params`, in schema order
    pub fn missing_slots(&self, params: &ExtractedParameters) -> Vec<SlotName> {
        self.required_slots().filter(|slot| !params.contains(*slot)).collect()
    }

    /// Slots whose value is not allowed by this intent's schema
    pub fn schema_violations(&self, params: &ExtractedParameters) -> Vec<SchemaViolation> {
        params
            .iter()
            .filter_map(|(name, slot)| {
                if !self.accepts(name) {
                    Some(SchemaViolation::UnknownSlot(name))
                } else if slot.value.kind() != name.kind() {
                    Some(SchemaViolation::WrongKind {
                        slot: name,
                        expected: name.kind(),
                        found: slot.value.kind(),
                    })
                } else {
                    None
                }
            })
            .collect()
    }

    /// Short phrase describing the action, for confirmation prompts
    pub fn describe(&self) -> &'static str {
        match self {
            Intent::GetStatistics => "show your herd statistics",
            Intent::GetStockStatus => "check your stock levels",
            Intent::CalculateCosts => "calculate your costs",
            Intent::GetReminders => "list your upcoming reminders",
            Intent::AnalyzeData => "analyse your farm data",
            Intent::CreateSale => "record a sale",
            Intent::CreateExpense => "record an expense",
            Intent::CreateFixedCharge => "record a fixed charge",
            Intent::CreateWeighing => "record a weighing",
            Intent::CreateVaccination => "record a vaccination",
            Intent::CreateVetVisit => "record a vet visit",
            Intent::CreateTreatment => "record a treatment",
            Intent::CreateDisease => "record a disease case",
            Intent::DeleteRecord => "delete a record",
            Intent::SearchAnimal => "look up an animal",
            Intent::SearchBatch => "look up a batch",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Intent::ALL
            .iter()
            .copied()
            .find(|intent| intent.as_str() == wanted)
            .ok_or_else(|| format!("unknown intent: {}", s))
    }
}

/// A slot that does not fit an intent's schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaViolation {
    UnknownSlot(SlotName),
    WrongKind {
        slot: SlotName,
        expected: SlotKind,
        found: SlotKind,
    },
}

impl SchemaViolation {
    pub fn slot(&self) -> SlotName {
        match self {
            SchemaViolation::UnknownSlot(slot) => *slot,
            SchemaViolation::WrongKind { slot, .. } => *slot,
        }
    }
}

/// How an intent was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    Rules,
    Semantic,
    /// Rules fired and the semantic classifier agreed
    RulesBoosted,
}

/// Classification result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedIntent {
    pub intent: Intent,
    /// Certainty in [0, 1]
    pub confidence: f64,
    /// Keywords (or reasoning) that support the decision
    pub evidence: Vec<String>,
    pub source: DetectionSource,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::{Provenance, SlotValue};

    #[test]
    fn test_every_intent_round_trips_its_name() {
        for intent in Intent::ALL {
            assert_eq!(intent.as_str().parse::<Intent>(), Ok(intent));
        }
        assert!("create_revenu".parse::<Intent>().is_err());
    }

    #[test]
    fn test_schema_slots_are_unique() {
        for intent in Intent::ALL {
            let schema = intent.schema();
            for (i, spec) in schema.iter().enumerate() {
                assert!(
                    schema[i + 1..].iter().all(|other| other.name != spec.name),
                    "{} declares {} twice",
                    intent,
                    spec.name
                );
            }
        }
    }

    #[test]
    fn test_missing_slots_in_schema_order() {
        let mut params = ExtractedParameters::new();
        assert_eq!(
            Intent::CreateWeighing.missing_slots(&params),
            vec![SlotName::Weight, SlotName::AnimalCode]
        );

        params.insert(SlotName::Weight, SlotValue::Number(45.0), Provenance::Text);
        assert_eq!(Intent::CreateWeighing.missing_slots(&params), vec![SlotName::AnimalCode]);
    }

    #[test]
    fn test_schema_violations() {
        let mut params = ExtractedParameters::new();
        params.insert(SlotName::Amount, SlotValue::Text("lots".into()), Provenance::Semantic);
        params.insert(SlotName::Vaccine, SlotValue::Text("Rouget".into()), Provenance::Text);

        let violations = Intent::CreateSale.schema_violations(&params);
        assert_eq!(violations.len(), 2);
        assert!(violations.contains(&SchemaViolation::UnknownSlot(SlotName::Vaccine)));
        assert!(violations.iter().any(|v| matches!(
            v,
            SchemaViolation::WrongKind { slot: SlotName::Amount, .. }
        )));
    }

    #[test]
    fn test_tiers() {
        assert_eq!(Intent::GetStatistics.tier(), IntentTier::Information);
        assert_eq!(Intent::CreateSale.tier(), IntentTier::Creation);
        assert_eq!(Intent::SearchBatch.tier(), IntentTier::Search);
        assert!(Intent::DeleteRecord.is_destructive());
        assert!(Intent::DeleteRecord.is_creation());
        assert!(Intent::SearchAnimal.is_read_only());
    }
}
