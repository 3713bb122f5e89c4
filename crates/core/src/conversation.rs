//! Conversation inputs: utterances and the execution context

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one conversation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One raw user message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub conversation_id: ConversationId,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Utterance {
    pub fn new(conversation_id: ConversationId, text: impl Into<String>) -> Self {
        Self::at(conversation_id, text, Utc::now())
    }

    pub fn at(
        conversation_id: ConversationId,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            conversation_id,
            text: text.into(),
            timestamp,
        }
    }
}

/// Reference to an animal known to the farm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimalRef {
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Small snapshot of domain entities, used for clarification suggestions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainSnapshot {
    /// Animals, most recently active first
    #[serde(default)]
    pub animals: Vec<AnimalRef>,
    /// Buyers of recent sales, most recent first
    #[serde(default)]
    pub recent_buyers: Vec<String>,
    #[serde(default)]
    pub veterinarians: Vec<String>,
}

/// Who is speaking and when, plus a domain snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub tenant_id: String,
    pub user_id: String,
    /// Reference date for relative dates ("yesterday")
    pub current_date: NaiveDate,
    #[serde(default)]
    pub snapshot: DomainSnapshot,
}

impl ExecutionContext {
    pub fn new(tenant_id: impl Into<String>, user_id: impl Into<String>, current_date: NaiveDate) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
            current_date,
            snapshot: DomainSnapshot::default(),
        }
    }

    pub fn with_snapshot(mut self, snapshot: DomainSnapshot) -> Self {
        self.snapshot = snapshot;
        self
    }
}
