//! Core traits and types for the farmhand assistant
//!
//! This crate provides foundational types used across all other crates:
//! - Intents with their fixed slot schemas
//! - Typed slot values with provenance
//! - Actions, queued actions and user corrections
//! - Turn outcomes returned to the caller
//! - Collaborator traits (executor, semantic helpers, storage)
//! - Error types

pub mod action;
pub mod conversation;
pub mod error;
pub mod intent;
pub mod outcome;
pub mod slots;
pub mod traits;

pub use action::{Action, ActionResult, ExecutionError, QueuedAction, UserCorrection};
pub use conversation::{AnimalRef, ConversationId, DomainSnapshot, ExecutionContext, Utterance};
pub use error::{Error, Result};
pub use intent::{DetectedIntent, DetectionSource, Intent, IntentTier, SchemaViolation, SlotSpec};
pub use outcome::{
    ClarificationPrompt, ConfirmationPrompt, ExecutedActionResult, QueuedAcknowledgement,
    Suggestion, TurnOutcome,
};
pub use slots::{Category, ExtractedParameters, Provenance, Slot, SlotKind, SlotName, SlotValue};

pub use traits::{
    ActionExecutor, AlwaysOnline, ConnectivityProbe, KeyValueStore, SemanticClassification,
    SemanticClassifier, SemanticError, SemanticExtractor, StorageError,
};
