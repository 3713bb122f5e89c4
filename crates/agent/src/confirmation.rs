//! Confirmation/execution gate with adaptive thresholds
//!
//! Three outcomes:
//! - `AutoExecute`: confidence at or above the high threshold
//! - `SoftConfirmExecute`: executes, but invites a correction
//! - `HardConfirmRequired`: nothing runs until the user says yes
//!
//! Critical actions (deletions, very large amounts, grave health decisions)
//! always take the hard path whatever the confidence. Corrections recorded by
//! the user can only raise the thresholds.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use farmhand_config::GateConfig;
use farmhand_core::{Action, Category, Intent, SlotName, SlotValue, UserCorrection};
use serde::{Deserialize, Serialize};

use crate::messages::{format_fcfa, CONFIRM_HINT};

/// Terms in a text slot that make an action critical (folded forms)
const HIGH_RISK_TERMS: &[&str] = &[
    "cull",
    "euthanize",
    "euthanise",
    "slaughter",
    "full quarantine",
    "abattage",
    "euthanasie",
    "quarantaine totale",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    AutoExecute,
    SoftConfirmExecute,
    HardConfirmRequired,
}

/// Why an action is critical
#[derive(Debug, Clone, PartialEq)]
pub enum CriticalReason {
    Destructive,
    LargeAmount(f64),
    HighRiskTerm(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationDecision {
    pub requires_confirmation: bool,
    pub should_execute: bool,
    /// Empty for read-only actions, whose executor message is used instead
    pub message: String,
    pub confidence: f64,
    pub state: GateState,
    pub critical: Option<CriticalReason>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub high: f64,
    pub medium: f64,
}

/// Serialisable correction state, persisted per user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrectionHistory {
    pub corrections: Vec<UserCorrection>,
    /// Timestamps of individual correction events inside the window
    #[serde(default)]
    pub events: VecDeque<DateTime<Utc>>,
    #[serde(default)]
    pub thresholds: Option<Thresholds>,
}

#[derive(Debug, Clone)]
pub struct ConfirmationGate {
    config: GateConfig,
    thresholds: Thresholds,
    corrections: Vec<UserCorrection>,
    events: VecDeque<DateTime<Utc>>,
}

impl Default for ConfirmationGate {
    fn default() -> Self {
        Self::new(GateConfig::default())
    }
}

impl ConfirmationGate {
    pub fn new(config: GateConfig) -> Self {
        let thresholds = Thresholds {
            high: config.high_confidence,
            medium: config.medium_confidence,
        };
        Self {
            config,
            thresholds,
            corrections: Vec::new(),
            events: VecDeque::new(),
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn corrections(&self) -> &[UserCorrection] {
        &self.corrections
    }

    pub fn critical_reason(&self, action: &Action) -> Option<CriticalReason> {
        if action.intent.is_destructive() {
            return Some(CriticalReason::Destructive);
        }

        if let Some(amount) = action.parameters.amount() {
            if amount > self.config.critical_amount {
                return Some(CriticalReason::LargeAmount(amount));
            }
        }

        action
            .parameters
            .iter()
            .filter_map(|(_, slot)| match &slot.value {
                SlotValue::Text(text) => Some(farmhand_text_processing::fold(text)),
                _ => None,
            })
            .find_map(|text| HIGH_RISK_TERMS.iter().copied().find(|term| text.contains(term)))
            .map(CriticalReason::HighRiskTerm)
    }

    pub fn should_confirm_and_execute(
        &self,
        action: &Action,
        confidence: f64,
        keywords: &[String],
    ) -> ConfirmationDecision {
        if let Some(reason) = self.critical_reason(action) {
            tracing::info!(intent = %action.intent, ?reason, "Critical action needs confirmation");
            return ConfirmationDecision {
                requires_confirmation: true,
                should_execute: false,
                message: critical_message(&reason),
                confidence,
                state: GateState::HardConfirmRequired,
                critical: Some(reason),
            };
        }

        if confidence >= self.thresholds.high {
            return ConfirmationDecision {
                requires_confirmation: false,
                should_execute: true,
                message: self.acknowledgement(action),
                confidence,
                state: GateState::AutoExecute,
                critical: None,
            };
        }

        if confidence >= self.thresholds.medium {
            return ConfirmationDecision {
                requires_confirmation: false,
                should_execute: true,
                message: soft_message(action),
                confidence,
                state: GateState::SoftConfirmExecute,
                critical: None,
            };
        }

        ConfirmationDecision {
            requires_confirmation: true,
            should_execute: false,
            message: low_confidence_message(action, keywords),
            confidence,
            state: GateState::HardConfirmRequired,
            critical: None,
        }
    }

    /// Positive acknowledgement echoing key values; empty for read-only intents
    pub fn acknowledgement(&self, action: &Action) -> String {
        let params = &action.parameters;
        let amount = params.amount();
        let category = params.value(SlotName::Category).and_then(SlotValue::as_category);

        match action.intent {
            intent if intent.is_read_only() => String::new(),
            Intent::CreateExpense => match (amount, category) {
                (Some(a), Some(c)) => format!("Recorded! Expense of {} for {}.", format_fcfa(a), c.label()),
                (Some(a), None) => format!("Recorded! Expense of {}.", format_fcfa(a)),
                _ => "Recorded!".to_string(),
            },
            Intent::CreateSale => match amount {
                Some(a) => format!("Recorded! Sale of {}.", format_fcfa(a)),
                None => "Recorded!".to_string(),
            },
            Intent::CreateWeighing => "Weighing recorded.".to_string(),
            Intent::CreateVaccination => "Vaccination recorded.".to_string(),
            _ => "Recorded!".to_string(),
        }
    }

    /// Record a user correction; returns true if this call tightened the thresholds
    pub fn record_correction(
        &mut self,
        original: &str,
        corrected: &str,
        slot: Option<SlotName>,
        at: DateTime<Utc>,
    ) -> bool {
        match self
            .corrections
            .iter_mut()
            .find(|c| c.matches(original, corrected, slot))
        {
            Some(existing) => {
                existing.count += 1;
                existing.timestamp = at;
            }
            None => self.corrections.push(UserCorrection {
                original: original.to_string(),
                corrected: corrected.to_string(),
                slot,
                timestamp: at,
                count: 1,
            }),
        }
        if self.corrections.len() > self.config.max_corrections {
            let excess = self.corrections.len() - self.config.max_corrections;
            self.corrections.drain(..excess);
        }

        self.events.push_back(at);
        self.prune_events(at);

        let recent = self.events.len();
        tracing::debug!(original, corrected, recent, "Recorded correction");

        if recent > self.config.correction_trigger {
            self.tighten()
        } else {
            false
        }
    }

    fn prune_events(&mut self, now: DateTime<Utc>) {
        let window = Duration::days(self.config.correction_window_days);
        self.events.retain(|t| now - *t < window);
        while self.events.len() > self.config.max_corrections {
            self.events.pop_front();
        }
    }

    /// Raise thresholds to the tightened pair. Never lowers them.
    fn tighten(&mut self) -> bool {
        let before = self.thresholds;
        self.thresholds.high = self.thresholds.high.max(self.config.tightened_high_confidence);
        self.thresholds.medium = self.thresholds.medium.max(self.config.tightened_medium_confidence);

        let changed = self.thresholds != before;
        if changed {
            tracing::info!(
                high = self.thresholds.high,
                medium = self.thresholds.medium,
                "Tightened confirmation thresholds after repeated corrections"
            );
        }
        changed
    }

    /// Category corrections seen often enough to apply automatically
    pub fn category_mappings(&self) -> HashMap<Category, Category> {
        self.corrections
            .iter()
            .filter(|c| c.slot == Some(SlotName::Category) && c.count >= self.config.mapping_min_count)
            .filter_map(|c| Some((Category::parse(&c.original)?, Category::parse(&c.corrected)?)))
            .collect()
    }

    pub fn snapshot(&self) -> CorrectionHistory {
        CorrectionHistory {
            corrections: self.corrections.clone(),
            events: self.events.clone(),
            thresholds: Some(self.thresholds),
        }
    }

    /// Load persisted state; thresholds only ever move up
    pub fn restore(&mut self, history: CorrectionHistory) {
        self.corrections = history.corrections;
        self.events = history.events;
        if let Some(saved) = history.thresholds {
            self.thresholds.high = self.thresholds.high.max(saved.high);
            self.thresholds.medium = self.thresholds.medium.max(saved.medium);
        }
    }
}

fn critical_message(reason: &CriticalReason) -> String {
    match reason {
        CriticalReason::LargeAmount(amount) => format!(
            "Careful, that is a large amount: {}. Do you confirm I should record it? {}",
            format_fcfa(*amount),
            CONFIRM_HINT
        ),
        CriticalReason::Destructive => format!(
            "Do you really want to delete this record? This cannot be undone. {}",
            CONFIRM_HINT
        ),
        CriticalReason::HighRiskTerm(term) => format!(
            "This is a serious health decision ({}). Do you really confirm? {}",
            term, CONFIRM_HINT
        ),
    }
}

fn soft_message(action: &Action) -> String {
    let amount = action.parameters.amount();
    let category = action
        .parameters
        .value(SlotName::Category)
        .and_then(SlotValue::as_category);

    match action.intent {
        intent if intent.is_read_only() => String::new(),
        Intent::CreateExpense => match (amount, category) {
            (Some(a), Some(c)) => format!(
                "I noted {} for {}. Tell me if this is wrong.",
                format_fcfa(a),
                c.label()
            ),
            (Some(a), None) => format!("I noted {}. Tell me if this is wrong.", format_fcfa(a)),
            _ => "I recorded it. Tell me if this is wrong.".to_string(),
        },
        Intent::CreateSale => match amount {
            Some(a) => format!("I noted {} for the sale. Tell me if this is wrong.", format_fcfa(a)),
            None => "I recorded the sale. Tell me if this is wrong.".to_string(),
        },
        _ => "I recorded it. Tell me if this is wrong.".to_string(),
    }
}

fn low_confidence_message(action: &Action, keywords: &[String]) -> String {
    let salient: Vec<&str> = keywords
        .iter()
        .map(String::as_str)
        .filter(|k| k.len() >= 3 && !k.chars().all(|c| c.is_ascii_digit()))
        .take(3)
        .collect();

    let understood = if salient.is_empty() {
        String::new()
    } else {
        format!("I understood \"{}\". ", salient.join(", "))
    };

    format!(
        "{}Do you want me to {}? {}",
        understood,
        action.intent.describe(),
        CONFIRM_HINT
    )
}
