//! Chat orchestrator — sequences one incoming user message through
//! compression, retrieval, assembly, generation, and persistence.
//!
//! No cross-request lock is held on a session: concurrent requests for
//! the same session may both recompute the summary cache (wasted work,
//! not a correctness problem — recompute is idempotent per prefix).
//! Turns are appended only after generation succeeds, so a failed reply
//! never leaves a user turn without an answer.

use std::sync::Arc;
use tracing::{debug, info, warn};

use haven_core::diary::DiaryResult;
use haven_core::error::{Error, Result};
use haven_core::provider::{Provider, ProviderRequest};
use haven_core::retrieval::{RetrievedItem, Retriever};
use haven_core::session::{SessionStore, Speaker};
use haven_core::token::TokenEstimator;

use crate::context::{ContextAssembler, HeuristicTokenEstimator};
use crate::diary::DiaryPipeline;
use crate::prompts;
use crate::summary_buffer::SummaryBuffer;

/// The reply produced for one processed message.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    /// The counselor's answer.
    pub answer: String,

    /// Creation dates of the diary entries that informed the answer;
    /// `None` when no diary entries were retrieved.
    pub diary_reference_dates: Option<Vec<String>>,
}

/// The orchestrator. One instance serves many sessions; all collaborators
/// are injected explicitly.
pub struct ChatOrchestrator {
    store: Arc<dyn SessionStore>,
    provider: Arc<dyn Provider>,
    diary_retriever: Arc<dyn Retriever>,
    knowledge_retriever: Option<Arc<dyn Retriever>>,
    buffer: SummaryBuffer,
    assembler: ContextAssembler,
    diary_pipeline: DiaryPipeline,
    model: String,
    temperature: f32,
    diary_top_k: usize,
    knowledge_top_k: usize,
}

impl ChatOrchestrator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        provider: Arc<dyn Provider>,
        diary_retriever: Arc<dyn Retriever>,
        model: impl Into<String>,
    ) -> Self {
        let model = model.into();
        Self {
            buffer: SummaryBuffer::new(
                store.clone(),
                provider.clone(),
                Arc::new(HeuristicTokenEstimator),
                &model,
            ),
            assembler: ContextAssembler::new(prompts::COUNSELOR_SYSTEM_PROMPT),
            diary_pipeline: DiaryPipeline::new(provider.clone(), &model),
            store,
            provider,
            diary_retriever,
            knowledge_retriever: None,
            model,
            // Slightly high for empathetic replies
            temperature: 0.7,
            diary_top_k: 3,
            knowledge_top_k: 3,
        }
    }

    /// Attach a shared-corpus retriever. Without one, replies carry no
    /// knowledge block.
    pub fn with_knowledge_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.knowledge_retriever = Some(retriever);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the summarization buffer's recency-window token budget.
    pub fn with_buffer_token_limit(mut self, limit: usize) -> Self {
        self.buffer = self.buffer.with_token_limit(limit);
        self
    }

    /// Replace the token estimator used to size the recency window.
    pub fn with_token_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.buffer = self.buffer.with_estimator(estimator);
        self
    }

    pub fn with_diary_top_k(mut self, k: usize) -> Self {
        self.diary_top_k = k;
        self
    }

    pub fn with_knowledge_top_k(mut self, k: usize) -> Self {
        self.knowledge_top_k = k;
        self
    }

    /// Process one user message end to end.
    pub async fn process(&self, session_id: &str, user_message: &str) -> Result<ChatOutcome> {
        if !self.store.exists(session_id).await? {
            return Err(Error::SessionNotFound(session_id.to_owned()));
        }
        let user_id = self.store.owner(session_id).await?;

        let full_log = self.store.log(session_id).await?;
        let buffered = self.buffer.compress(session_id, &full_log).await?;

        let diary_items = self.fetch_diary_items(&user_id, user_message).await;
        let knowledge_snippet = self.fetch_knowledge_snippet(user_message).await;

        let context = self.assembler.assemble(
            knowledge_snippet.as_deref(),
            &diary_items,
            &buffered,
            user_message,
        );

        let request =
            ProviderRequest::new(&self.model, context).with_temperature(self.temperature);
        let response = self.provider.complete(request).await?;
        let answer = response.message.content;

        // Persist only after a successful generation, user turn first.
        self.store
            .append(session_id, Speaker::User, user_message)
            .await?;
        self.store
            .append(session_id, Speaker::Assistant, &answer)
            .await?;

        info!(
            session_id,
            log_turns = full_log.len(),
            diary_refs = diary_items.len(),
            "Reply generated"
        );

        let diary_reference_dates = if diary_items.is_empty() {
            None
        } else {
            Some(
                diary_items
                    .iter()
                    .map(|item| item.created_at().unwrap_or("unknown").to_owned())
                    .collect(),
            )
        };

        Ok(ChatOutcome {
            answer,
            diary_reference_dates,
        })
    }

    /// Turn the whole session transcript into a diary entry.
    pub async fn generate_diary(&self, session_id: &str) -> Result<DiaryResult> {
        if !self.store.exists(session_id).await? {
            return Err(Error::SessionNotFound(session_id.to_owned()));
        }
        let full_log = self.store.log(session_id).await?;
        self.diary_pipeline.generate(&full_log).await
    }

    /// Best-effort diary lookup scoped to the session owner. Unavailable
    /// retrieval degrades to no excerpts.
    async fn fetch_diary_items(&self, user_id: &str, query: &str) -> Vec<RetrievedItem> {
        match self
            .diary_retriever
            .search(user_id, query, self.diary_top_k)
            .await
        {
            Ok(items) => {
                debug!(count = items.len(), "Diary entries retrieved");
                items
            }
            Err(e) => {
                warn!(error = %e, "Diary retrieval unavailable, continuing without excerpts");
                Vec::new()
            }
        }
    }

    /// Best-effort shared-corpus lookup. The snippet is the joined content
    /// of the top hits; unavailable retrieval degrades to no snippet.
    async fn fetch_knowledge_snippet(&self, query: &str) -> Option<String> {
        let retriever = self.knowledge_retriever.as_ref()?;
        match retriever.search("", query, self.knowledge_top_k).await {
            Ok(items) if !items.is_empty() => Some(
                items
                    .iter()
                    .map(|item| item.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n"),
            ),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Knowledge retrieval unavailable, continuing without snippet");
                None
            }
        }
    }
}
