//! SQLite session store.
//!
//! Uses a single SQLite database file with three tables:
//! - `sessions` — one row per session with its owner
//! - `turns` — the append-only conversation log
//! - `session_fields` — named per-session fields (cached summary, covered count)
//!
//! Each statement commits on its own; there is no transaction spanning the
//! log and the fields, which matches the per-key atomicity contract.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

use haven_core::error::StoreError;
use haven_core::session::{SessionStore, Speaker, Turn};

/// A persistent SQLite session store.
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    /// Create a new SQLite store from a connection path.
    ///
    /// The database and all tables are created automatically.
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite session store initialized at {path}");
        Ok(store)
    }

    /// Run schema migrations — idempotent, safe to call on every startup.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                session_id  TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL,
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("sessions table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS turns (
                iid         INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id  TEXT NOT NULL REFERENCES sessions(session_id),
                speaker     TEXT NOT NULL,
                content     TEXT NOT NULL,
                timestamp   TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("turns table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_turns_session ON turns(session_id, iid)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("turns index: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session_fields (
                session_id  TEXT NOT NULL REFERENCES sessions(session_id),
                key         TEXT NOT NULL,
                value       TEXT NOT NULL,
                PRIMARY KEY (session_id, key)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("session_fields table: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<Turn, StoreError> {
        let speaker_str: String = row
            .try_get("speaker")
            .map_err(|e| StoreError::QueryFailed(format!("speaker column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| StoreError::QueryFailed(format!("content column: {e}")))?;
        let timestamp_str: String = row
            .try_get("timestamp")
            .map_err(|e| StoreError::QueryFailed(format!("timestamp column: {e}")))?;

        let speaker = match speaker_str.as_str() {
            "user" => Speaker::User,
            "assistant" => Speaker::Assistant,
            other => {
                return Err(StoreError::QueryFailed(format!(
                    "unknown speaker in log: {other}"
                )))
            }
        };

        let timestamp = chrono::DateTime::parse_from_rfc3339(&timestamp_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Turn {
            speaker,
            content,
            timestamp,
        })
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create(&self, session_id: &str, user_id: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO sessions (session_id, user_id, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT session failed: {e}")))?;

        debug!("Created session {session_id} for {user_id}");
        Ok(())
    }

    async fn exists(&self, session_id: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM sessions WHERE session_id = ?1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("exists check: {e}")))?;
        Ok(row.is_some())
    }

    async fn owner(&self, session_id: &str) -> Result<String, StoreError> {
        let row = sqlx::query("SELECT user_id FROM sessions WHERE session_id = ?1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("owner lookup: {e}")))?
            .ok_or_else(|| StoreError::QueryFailed(format!("unknown session: {session_id}")))?;

        row.try_get("user_id")
            .map_err(|e| StoreError::QueryFailed(format!("user_id column: {e}")))
    }

    async fn log(&self, session_id: &str) -> Result<Vec<Turn>, StoreError> {
        let rows = sqlx::query(
            "SELECT speaker, content, timestamp FROM turns WHERE session_id = ?1 ORDER BY iid",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("log load: {e}")))?;

        rows.iter().map(Self::row_to_turn).collect()
    }

    async fn append(
        &self,
        session_id: &str,
        speaker: Speaker,
        content: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO turns (session_id, speaker, content, timestamp) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(session_id)
        .bind(speaker.as_str())
        .bind(content)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT turn failed: {e}")))?;
        Ok(())
    }

    async fn get_field(
        &self,
        session_id: &str,
        key: &str,
    ) -> Result<Option<String>, StoreError> {
        let row = sqlx::query(
            "SELECT value FROM session_fields WHERE session_id = ?1 AND key = ?2",
        )
        .bind(session_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("field read: {e}")))?;

        match row {
            Some(row) => row
                .try_get("value")
                .map(Some)
                .map_err(|e| StoreError::QueryFailed(format!("value column: {e}"))),
            None => Ok(None),
        }
    }

    async fn set_field(
        &self,
        session_id: &str,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO session_fields (session_id, key, value)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(session_id, key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(session_id)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("field write: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteSessionStore {
        SqliteSessionStore::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn create_and_owner() {
        let store = test_store().await;
        store.create("s1", "user-a").await.unwrap();

        assert!(store.exists("s1").await.unwrap());
        assert!(!store.exists("s2").await.unwrap());
        assert_eq!(store.owner("s1").await.unwrap(), "user-a");
    }

    #[tokio::test]
    async fn duplicate_create_fails() {
        let store = test_store().await;
        store.create("s1", "user-a").await.unwrap();
        assert!(store.create("s1", "user-a").await.is_err());
    }

    #[tokio::test]
    async fn log_round_trip_in_order() {
        let store = test_store().await;
        store.create("s1", "user-a").await.unwrap();

        store.append("s1", Speaker::User, "hello").await.unwrap();
        store.append("s1", Speaker::Assistant, "hi there").await.unwrap();
        store.append("s1", Speaker::User, "how are you").await.unwrap();

        let log = store.log("s1").await.unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].speaker, Speaker::User);
        assert_eq!(log[0].content, "hello");
        assert_eq!(log[1].speaker, Speaker::Assistant);
        assert_eq!(log[2].content, "how are you");
    }

    #[tokio::test]
    async fn empty_log_for_fresh_session() {
        let store = test_store().await;
        store.create("s1", "user-a").await.unwrap();
        assert!(store.log("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn field_upsert() {
        let store = test_store().await;
        store.create("s1", "user-a").await.unwrap();

        assert!(store.get_field("s1", "summary").await.unwrap().is_none());

        store.set_field("s1", "summary", "first").await.unwrap();
        store.set_field("s1", "count", "4").await.unwrap();
        store.set_field("s1", "summary", "second").await.unwrap();

        assert_eq!(
            store.get_field("s1", "summary").await.unwrap().as_deref(),
            Some("second")
        );
        assert_eq!(
            store.get_field("s1", "count").await.unwrap().as_deref(),
            Some("4")
        );
    }

    #[tokio::test]
    async fn owner_of_unknown_session_errors() {
        let store = test_store().await;
        assert!(store.owner("ghost").await.is_err());
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = format!("sqlite://{}", dir.path().join("haven.db").display());

        {
            let store = SqliteSessionStore::new(&path).await.unwrap();
            store.create("s1", "user-a").await.unwrap();
            store.append("s1", Speaker::User, "remember me").await.unwrap();
            store.set_field("s1", "summary", "kept").await.unwrap();
        }

        let store = SqliteSessionStore::new(&path).await.unwrap();
        assert!(store.exists("s1").await.unwrap());
        assert_eq!(store.log("s1").await.unwrap()[0].content, "remember me");
        assert_eq!(
            store.get_field("s1", "summary").await.unwrap().as_deref(),
            Some("kept")
        );
    }
}
