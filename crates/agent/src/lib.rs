//! Conversational action resolution
//!
//! Features:
//! - Per-conversation sessions running the full turn pipeline
//! - Context store with bounded recency lists and anaphora
//! - Clarification engine with context suggestions
//! - Plausibility checks before anything is recorded
//! - Adaptive confirmation gate learning from user corrections
//! - Transient failures handed to the durable retry queue

pub mod clarification;
pub mod confirmation;
pub mod context;
pub mod messages;
pub mod session;
pub mod validation;

pub use clarification::{
    ClarificationEngine, ClarificationRecord, ClarificationResult, FrequentClarification,
};
pub use confirmation::{
    ConfirmationDecision, ConfirmationGate, CorrectionHistory, CriticalReason, GateState,
    Thresholds,
};
pub use context::{
    ContextEntity, ConversationContextStore, EntityKind, EntitySource, ExtractionContext,
    TurnRecord,
};
pub use session::{AgentServices, ConversationSession, SessionConfig};
pub use validation::{validate, ValidationIssue, ValidationReport};

use farmhand_persistence::PersistenceError;
use thiserror::Error;
use uuid::Uuid;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No pending confirmation for action {0}")]
    NoPendingConfirmation(Uuid),
}

impl From<PersistenceError> for AgentError {
    fn from(err: PersistenceError) -> Self {
        AgentError::Storage(err.to_string())
    }
}

impl From<AgentError> for farmhand_core::Error {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Serialization(e) => farmhand_core::Error::Serialization(e),
            AgentError::Storage(msg) => farmhand_core::Error::Storage(msg),
            AgentError::NoPendingConfirmation(id) => {
                farmhand_core::Error::InvalidInput(format!("no pending confirmation for action {}", id))
            }
        }
    }
}
