//! Domain actions, their results, and the records built around them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::conversation::ExecutionContext;
use crate::intent::Intent;
use crate::slots::{ExtractedParameters, SlotName};

/// A resolved action ready for the gate and the executor.
///
/// The idempotency key is minted once when the action is built and is
/// carried unchanged through confirmation, the retry queue and every
/// executor call, so replays can be deduplicated downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: Uuid,
    pub intent: Intent,
    pub parameters: ExtractedParameters,
    pub idempotency_key: Uuid,
}

impl Action {
    pub fn new(intent: Intent, parameters: ExtractedParameters) -> Self {
        Self {
            id: Uuid::new_v4(),
            intent,
            parameters,
            idempotency_key: Uuid::new_v4(),
        }
    }
}

/// Result reported by the domain executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            error: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Executor failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// Network failure, 5xx or timeout; worth retrying
    #[error("transient failure: {0}")]
    Transient(String),

    /// Rejected by the domain; retrying will not help
    #[error("permanent failure: {0}")]
    Permanent(String),
}

impl ExecutionError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ExecutionError::Transient(_))
    }

    pub fn timeout(timeout_ms: u64) -> Self {
        ExecutionError::Transient(format!("timed out after {}ms", timeout_ms))
    }
}

/// An action waiting in the retry queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedAction {
    pub id: Uuid,
    pub action: Action,
    pub context: ExecutionContext,
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: u8,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl QueuedAction {
    pub fn new(action: Action, context: ExecutionContext, error: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            context,
            enqueued_at: Utc::now(),
            retry_count: 0,
            last_error: Some(error.into()),
        }
    }
}

/// A correction the user made to something the assistant recorded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCorrection {
    pub original: String,
    pub corrected: String,
    #[serde(default)]
    pub slot: Option<SlotName>,
    /// Last time this correction was recorded
    pub timestamp: DateTime<Utc>,
    pub count: u32,
}

impl UserCorrection {
    pub fn matches(&self, original: &str, corrected: &str, slot: Option<SlotName>) -> bool {
        self.original == original && self.corrected == corrected && self.slot == slot
    }
}
