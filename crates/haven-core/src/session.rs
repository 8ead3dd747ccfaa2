//! Session store trait and conversation turn types.
//!
//! A session is an append-only log of turns plus a small set of named
//! fields (the cached conversation summary and the count of turns it
//! covers). The store offers per-key atomicity only — no transactions
//! span the log and the fields, which matches the consistency model the
//! summary cache is designed for.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::message::{Message, Role};

/// Who spoke a persisted conversation turn. Persisted logs only ever
/// contain user and assistant turns; system messages are assembled per
/// request and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::User => "user",
            Speaker::Assistant => "assistant",
        }
    }
}

impl From<Speaker> for Role {
    fn from(speaker: Speaker) -> Self {
        match speaker {
            Speaker::User => Role::User,
            Speaker::Assistant => Role::Assistant,
        }
    }
}

/// One message in a persisted conversation log. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Speaker::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Speaker::Assistant, content)
    }

    pub fn new(speaker: Speaker, content: impl Into<String>) -> Self {
        Self {
            speaker,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Convert this turn to a role-tagged context message.
    pub fn to_message(&self) -> Message {
        match self.speaker {
            Speaker::User => Message::user(&self.content),
            Speaker::Assistant => Message::assistant(&self.content),
        }
    }
}

/// The session store trait.
///
/// Implementations: SQLite, in-memory (for testing and ephemeral runs).
/// Guarantees per-call atomicity only; concurrent writers to the same
/// session are not serialized by the store.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// Create a session owned by `user_id`. Creating an existing session
    /// is an error.
    async fn create(&self, session_id: &str, user_id: &str)
        -> std::result::Result<(), StoreError>;

    /// Whether the session exists.
    async fn exists(&self, session_id: &str) -> std::result::Result<bool, StoreError>;

    /// The user who owns the session.
    async fn owner(&self, session_id: &str) -> std::result::Result<String, StoreError>;

    /// The full ordered turn log.
    async fn log(&self, session_id: &str) -> std::result::Result<Vec<Turn>, StoreError>;

    /// Append one turn to the log.
    async fn append(
        &self,
        session_id: &str,
        speaker: Speaker,
        content: &str,
    ) -> std::result::Result<(), StoreError>;

    /// Read a named session field (e.g., the cached summary).
    async fn get_field(
        &self,
        session_id: &str,
        key: &str,
    ) -> std::result::Result<Option<String>, StoreError>;

    /// Write a named session field.
    async fn set_field(
        &self,
        session_id: &str,
        key: &str,
        value: &str,
    ) -> std::result::Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speaker_maps_to_role() {
        assert_eq!(Role::from(Speaker::User), Role::User);
        assert_eq!(Role::from(Speaker::Assistant), Role::Assistant);
    }

    #[test]
    fn turn_converts_to_message() {
        let turn = Turn::user("I went outside today");
        let msg = turn.to_message();
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "I went outside today");
    }

    #[test]
    fn turn_serialization_roundtrip() {
        let turn = Turn::assistant("That sounds like a big step.");
        let json = serde_json::to_string(&turn).unwrap();
        assert!(json.contains("\"assistant\""));
        let back: Turn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, turn);
    }
}
