//! In-memory session store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use haven_core::error::StoreError;
use haven_core::session::{SessionStore, Speaker, Turn};

#[derive(Default)]
struct SessionRecord {
    user_id: String,
    turns: Vec<Turn>,
    fields: HashMap<String, String>,
}

/// A session store backed by a map behind an async RwLock.
///
/// Each call takes the lock once, so individual operations are atomic;
/// nothing coordinates across calls, matching the store contract.
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn create(&self, session_id: &str, user_id: &str) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(session_id) {
            return Err(StoreError::Storage(format!(
                "session already exists: {session_id}"
            )));
        }
        sessions.insert(
            session_id.to_owned(),
            SessionRecord {
                user_id: user_id.to_owned(),
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn exists(&self, session_id: &str) -> Result<bool, StoreError> {
        Ok(self.sessions.read().await.contains_key(session_id))
    }

    async fn owner(&self, session_id: &str) -> Result<String, StoreError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|s| s.user_id.clone())
            .ok_or_else(|| StoreError::QueryFailed(format!("unknown session: {session_id}")))
    }

    async fn log(&self, session_id: &str) -> Result<Vec<Turn>, StoreError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|s| s.turns.clone())
            .ok_or_else(|| StoreError::QueryFailed(format!("unknown session: {session_id}")))
    }

    async fn append(
        &self,
        session_id: &str,
        speaker: Speaker,
        content: &str,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        let record = sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::QueryFailed(format!("unknown session: {session_id}")))?;
        record.turns.push(Turn::new(speaker, content));
        Ok(())
    }

    async fn get_field(
        &self,
        session_id: &str,
        key: &str,
    ) -> Result<Option<String>, StoreError> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .map(|s| s.fields.get(key).cloned())
            .ok_or_else(|| StoreError::QueryFailed(format!("unknown session: {session_id}")))
    }

    async fn set_field(
        &self,
        session_id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        let record = sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::QueryFailed(format!("unknown session: {session_id}")))?;
        record.fields.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}
