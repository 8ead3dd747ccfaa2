//! Keyword retriever — an in-process ranked retriever.
//!
//! Scores documents by keyword occurrence density. Stands in for the
//! external vector engine wherever a `Retriever` is needed without
//! network dependencies: tests, the CLI, and offline runs. Documents
//! stored without an owner are shared and match any scope; owned
//! documents (diary entries) match their owner's scope only.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use haven_core::error::RetrievalError;
use haven_core::retrieval::{RetrievedItem, Retriever};

/// A document held by the keyword retriever.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub id: String,
    /// `None` marks a shared-corpus document visible to every scope.
    pub owner: Option<String>,
    pub content: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// An in-memory keyword-scored retriever.
pub struct KeywordRetriever {
    name: String,
    documents: Arc<RwLock<Vec<StoredDocument>>>,
}

impl KeywordRetriever {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Add a document. Pass `owner` for scoped documents (diary entries),
    /// `None` for shared-corpus content.
    pub async fn add(
        &self,
        owner: Option<&str>,
        content: impl Into<String>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> String {
        let doc = StoredDocument {
            id: Uuid::new_v4().to_string(),
            owner: owner.map(ToOwned::to_owned),
            content: content.into(),
            metadata,
        };
        let id = doc.id.clone();
        self.documents.write().await.push(doc);
        id
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl Retriever for KeywordRetriever {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(
        &self,
        scope: &str,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedItem>, RetrievalError> {
        let documents = self.documents.read().await;
        let query_lower = query.to_lowercase();
        let terms: Vec<&str> = query_lower.split_whitespace().collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut results: Vec<RetrievedItem> = documents
            .iter()
            .filter(|d| d.owner.is_none() || d.owner.as_deref() == Some(scope))
            .filter_map(|d| {
                let content_lower = d.content.to_lowercase();
                // Occurrence density across all query terms
                let occurrences: usize = terms
                    .iter()
                    .map(|t| content_lower.matches(t).count())
                    .sum();
                if occurrences == 0 {
                    return None;
                }
                let score =
                    occurrences as f32 / (d.content.len() as f32 / 100.0).max(1.0);
                Some(RetrievedItem {
                    content: d.content.clone(),
                    metadata: d.metadata.clone(),
                    score,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(k);

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dated(date: &str) -> serde_json::Map<String, serde_json::Value> {
        let mut m = serde_json::Map::new();
        m.insert("created_at".into(), serde_json::json!(date));
        m
    }

    #[tokio::test]
    async fn scoped_search_filters_by_owner() {
        let retriever = KeywordRetriever::new("diary");
        retriever
            .add(Some("alice"), "Felt anxious about leaving the house", dated("2025-10-01"))
            .await;
        retriever
            .add(Some("bob"), "Felt anxious before the interview", dated("2025-10-02"))
            .await;

        let hits = retriever.search("alice", "anxious", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].content.contains("leaving the house"));
        assert_eq!(hits[0].created_at(), Some("2025-10-01"));
    }

    #[tokio::test]
    async fn shared_documents_match_any_scope() {
        let retriever = KeywordRetriever::new("knowledge");
        retriever
            .add(None, "Behavioral activation starts with small steps", Default::default())
            .await;

        let hits = retriever.search("anyone", "small steps", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn results_ranked_and_truncated() {
        let retriever = KeywordRetriever::new("diary");
        retriever
            .add(Some("u"), "sleep sleep sleep", Default::default())
            .await;
        retriever.add(Some("u"), "sleep once", Default::default()).await;
        retriever
            .add(Some("u"), "nothing relevant here", Default::default())
            .await;

        let hits = retriever.search("u", "sleep", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].content.contains("sleep sleep"));
    }

    #[tokio::test]
    async fn no_match_is_empty() {
        let retriever = KeywordRetriever::new("diary");
        retriever.add(Some("u"), "a quiet day", Default::default()).await;
        assert!(retriever.search("u", "volcano", 5).await.unwrap().is_empty());
    }
}
