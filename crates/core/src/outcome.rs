//! What a conversation turn produces

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::slots::{SlotName, SlotValue};

/// Outcome of one turn, always carrying a user-facing message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnOutcome {
    Executed(ExecutedActionResult),
    Clarification(ClarificationPrompt),
    Queued(QueuedAcknowledgement),
    Confirmation(ConfirmationPrompt),
}

impl TurnOutcome {
    /// Metric label for the outcome kind
    pub fn kind(&self) -> &'static str {
        match self {
            TurnOutcome::Executed(_) => "executed",
            TurnOutcome::Clarification(_) => "clarification",
            TurnOutcome::Queued(_) => "queued",
            TurnOutcome::Confirmation(_) => "confirmation",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            TurnOutcome::Executed(result) => &result.message,
            TurnOutcome::Clarification(prompt) => &prompt.question,
            TurnOutcome::Queued(ack) => &ack.message,
            TurnOutcome::Confirmation(prompt) => &prompt.message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedActionResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Stable error code, never a raw internal error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A value proposed from context for a missing slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub slot: SlotName,
    pub label: String,
    pub value: SlotValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarificationPrompt {
    pub question: String,
    pub missing_slots: Vec<SlotName>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<Suggestion>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedAcknowledgement {
    pub will_retry: bool,
    pub message: String,
    pub queued_id: Uuid,
}

/// Explicit confirmation step before a risky or uncertain action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationPrompt {
    pub action_id: Uuid,
    pub message: String,
    pub critical: bool,
}
