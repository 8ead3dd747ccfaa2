//! Retriever trait — the abstraction over ranked similarity search.
//!
//! Two instances back the agent: one scoped to a user's diary history and
//! one over the shared knowledge corpus. The engine behind a retriever
//! (vector index, keyword index, remote service) is opaque to the core;
//! availability is best-effort and callers degrade on failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

/// A single ranked search hit. Transient — produced per query, never
/// persisted by the core. Rank is implied by position in the result list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedItem {
    /// The matched text content.
    pub content: String,

    /// Item metadata. Diary items carry a `created_at` timestamp here.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    /// Relevance score (backend-specific scale).
    #[serde(default)]
    pub score: f32,
}

impl RetrievedItem {
    /// The creation timestamp recorded in metadata, if any.
    pub fn created_at(&self) -> Option<&str> {
        self.metadata.get("created_at").and_then(|v| v.as_str())
    }
}

/// The retriever trait.
///
/// `scope` restricts the search to one owner's documents; retrievers over
/// a shared corpus may ignore it.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// The retriever name (e.g., "keyword", "pgvector").
    fn name(&self) -> &str;

    /// Return up to `k` items ranked by relevance to `query`.
    async fn search(
        &self,
        scope: &str,
        query: &str,
        k: usize,
    ) -> std::result::Result<Vec<RetrievedItem>, RetrievalError>;
}
