//! Plausibility checks on a fully resolved action
//!
//! Errors mean a value cannot be right (a negative amount, a 900 kg pig);
//! the session asks for those slots again. Warnings mean a value is unusual
//! and the user has to confirm before anything runs.

use farmhand_config::constants::validation::*;
use farmhand_core::{ExecutionContext, ExtractedParameters, Intent, SlotName, SlotValue};
use serde::{Deserialize, Serialize};

use crate::messages::{format_fcfa, join_labels, slot_label};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub slot: SlotName,
    pub message: String,
}

impl ValidationIssue {
    fn new(slot: SlotName, message: impl Into<String>) -> Self {
        Self {
            slot,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Slots with an error, in first-reported order
    pub fn invalid_slots(&self) -> Vec<SlotName> {
        let mut slots = Vec::new();
        for issue in &self.errors {
            if !slots.contains(&issue.slot) {
                slots.push(issue.slot);
            }
        }
        slots
    }

    /// Question asking the user to correct the invalid slots
    pub fn correction_question(&self) -> String {
        let problems: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
        let labels: Vec<&str> = self.invalid_slots().into_iter().map(slot_label).collect();
        format!(
            "{} Can you give me {} again?",
            problems.join(" "),
            join_labels(&labels)
        )
    }

    /// Warnings as one sentence block, empty when there are none
    pub fn warning_text(&self) -> String {
        self.warnings
            .iter()
            .map(|w| w.message.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Check `params` for `intent` against the farm's plausibility limits
pub fn validate(intent: Intent, params: &ExtractedParameters, ctx: &ExecutionContext) -> ValidationReport {
    let mut report = ValidationReport::default();
    if intent.is_read_only() {
        return report;
    }

    let number = |slot| params.value(slot).and_then(SlotValue::as_number);
    let amount = number(SlotName::Amount);
    let quantity = number(SlotName::Quantity);
    let weight = number(SlotName::Weight);

    if let Some(amount) = amount {
        check_amount(intent, amount, &mut report);
    }

    if let Some(quantity) = quantity {
        if quantity < 1.0 || quantity > MAX_QUANTITY || quantity.fract() != 0.0 {
            report.errors.push(ValidationIssue::new(
                SlotName::Quantity,
                format!(
                    "The number of animals must be a whole number between 1 and {}.",
                    MAX_QUANTITY
                ),
            ));
        }
    }

    if let Some(weight) = weight {
        if weight <= 0.0 || weight > MAX_WEIGHT_KG {
            report.errors.push(ValidationIssue::new(
                SlotName::Weight,
                format!("A weight of {} kg is not realistic for a pig.", SlotValue::Number(weight)),
            ));
        } else if intent == Intent::CreateWeighing && weight < MIN_WEIGHT_KG {
            report.warnings.push(ValidationIssue::new(
                SlotName::Weight,
                format!("{} kg is very light, is it a newborn piglet?", SlotValue::Number(weight)),
            ));
        }
    }

    // Per-kg price only means something once every input is sound
    if intent == Intent::CreateSale && report.is_valid() {
        if let (Some(amount), Some(quantity), Some(weight)) = (amount, quantity, weight) {
            let per_kg = amount / (quantity * weight);
            if !(PRICE_PER_KG_MIN..=PRICE_PER_KG_MAX).contains(&per_kg) {
                report.warnings.push(ValidationIssue::new(
                    SlotName::Amount,
                    format!(
                        "That is {} per kg, outside the usual {} to {}.",
                        format_fcfa(per_kg),
                        format_fcfa(PRICE_PER_KG_MIN),
                        format_fcfa(PRICE_PER_KG_MAX)
                    ),
                ));
            }
        }
    }

    if let Some(code) = params.value(SlotName::AnimalCode).and_then(SlotValue::as_text) {
        let animals = &ctx.snapshot.animals;
        if !animals.is_empty() && !animals.iter().any(|a| a.code.eq_ignore_ascii_case(code)) {
            report.warnings.push(ValidationIssue::new(
                SlotName::AnimalCode,
                format!("I don't know an animal {} on this farm.", code),
            ));
        }
    }

    if let Some(date) = params.value(SlotName::Date).and_then(SlotValue::as_date) {
        if date > ctx.current_date {
            report.warnings.push(ValidationIssue::new(
                SlotName::Date,
                format!("The date {} is in the future.", date),
            ));
        }
    }

    if !report.errors.is_empty() || !report.warnings.is_empty() {
        tracing::debug!(
            %intent,
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "Validation flagged the action"
        );
    }
    report
}

fn check_amount(intent: Intent, amount: f64, report: &mut ValidationReport) {
    if amount <= 0.0 {
        report.errors.push(ValidationIssue::new(
            SlotName::Amount,
            "The amount must be greater than zero.",
        ));
        return;
    }

    let high = match intent {
        Intent::CreateSale => SALE_AMOUNT_HIGH,
        Intent::CreateExpense | Intent::CreateFixedCharge => EXPENSE_AMOUNT_HIGH,
        _ => return,
    };
    if amount > high {
        report.warnings.push(ValidationIssue::new(
            SlotName::Amount,
            format!("{} is a very large amount (over {}).", format_fcfa(amount), format_fcfa(high)),
        ));
    } else if intent == Intent::CreateSale && amount < SALE_AMOUNT_LOW {
        report.warnings.push(ValidationIssue::new(
            SlotName::Amount,
            format!("{} is a very small amount for a sale.", format_fcfa(amount)),
        ));
    }
}
