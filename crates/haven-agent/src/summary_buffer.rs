//! Summarization-buffer conversation memory.
//!
//! Converts an unbounded session log into a bounded context: old turns are
//! replaced by a cached model-written summary, recent turns pass through
//! verbatim. The recency window is sized by accumulated estimated tokens.
//!
//! The summary is a prefix cache, not a rolling summary: each recompute
//! re-summarizes the *entire* old-turn prefix from scratch, so recomputing
//! is idempotent for a given prefix. The staleness check and the summary
//! write are separate store operations with no lock between them —
//! concurrent requests for one session may both recompute, which wastes a
//! model call but cannot corrupt the cache.

use std::sync::Arc;
use tracing::{debug, info};

use haven_core::error::Result;
use haven_core::message::Message;
use haven_core::provider::{Provider, ProviderRequest};
use haven_core::session::{SessionStore, Speaker, Turn};
use haven_core::token::TokenEstimator;

use crate::prompts;

/// Session field holding the cached summary text.
pub const SUMMARY_FIELD: &str = "conversation_summary";

/// Session field holding how many turns the cached summary covers.
pub const SUMMARIZED_COUNT_FIELD: &str = "summarized_count";

/// Default recency-window budget, in estimated tokens.
pub const DEFAULT_BUFFER_TOKEN_LIMIT: usize = 2000;

/// The summarization-buffer memory.
pub struct SummaryBuffer {
    store: Arc<dyn SessionStore>,
    provider: Arc<dyn Provider>,
    estimator: Arc<dyn TokenEstimator>,
    model: String,
    token_limit: usize,
}

impl SummaryBuffer {
    pub fn new(
        store: Arc<dyn SessionStore>,
        provider: Arc<dyn Provider>,
        estimator: Arc<dyn TokenEstimator>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            store,
            provider,
            estimator,
            model: model.into(),
            token_limit: DEFAULT_BUFFER_TOKEN_LIMIT,
        }
    }

    /// Set the recency-window token budget.
    pub fn with_token_limit(mut self, limit: usize) -> Self {
        self.token_limit = limit;
        self
    }

    /// Replace the token estimator.
    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    /// Compress the full session log into a bounded message sequence:
    /// one labeled summary message (when old turns exist) followed by the
    /// recent turns verbatim, in original order.
    pub async fn compress(&self, session_id: &str, full_log: &[Turn]) -> Result<Vec<Message>> {
        if full_log.is_empty() {
            return Ok(Vec::new());
        }

        let (old, recent) = self.split_window(full_log);
        let recent_messages: Vec<Message> = recent.iter().map(Turn::to_message).collect();

        if old.is_empty() {
            debug!(turns = recent.len(), "Conversation fits the buffer, no summary needed");
            return Ok(recent_messages);
        }

        let summary = self.load_or_recompute_summary(session_id, old).await?;

        let mut messages = Vec::with_capacity(recent_messages.len() + 1);
        messages.push(Message::system(format!(
            "{}\n{}",
            prompts::SUMMARY_LABEL,
            summary
        )));
        messages.extend(recent_messages);
        Ok(messages)
    }

    /// Split the log into (old, recent) by walking backward from the most
    /// recent turn and accumulating estimated token cost while it stays
    /// within the budget.
    ///
    /// The most recent turn is always kept, even when it alone exceeds the
    /// budget — a non-empty log never yields an empty recent window.
    fn split_window<'a>(&self, full_log: &'a [Turn]) -> (&'a [Turn], &'a [Turn]) {
        let mut start = full_log.len();
        let mut total = 0usize;

        for (idx, turn) in full_log.iter().enumerate().rev() {
            let cost = self.estimator.count(&turn.content);
            if start < full_log.len() && total + cost > self.token_limit {
                break;
            }
            start = idx;
            total += cost;
        }

        full_log.split_at(start)
    }

    /// Reuse the cached summary when it still covers the whole old-turn
    /// prefix; otherwise re-summarize the prefix and write the cache back.
    ///
    /// Stale means: no summary stored, no covered-count stored, or the
    /// stored count is strictly less than the current old-turn count. The
    /// two cache writes are ordered summary-then-count, so a crash between
    /// them leaves the count missing and the next read recomputes.
    async fn load_or_recompute_summary(
        &self,
        session_id: &str,
        old: &[Turn],
    ) -> Result<String> {
        let cached_summary = self.store.get_field(session_id, SUMMARY_FIELD).await?;
        let cached_count = self
            .store
            .get_field(session_id, SUMMARIZED_COUNT_FIELD)
            .await?
            .and_then(|v| v.parse::<usize>().ok());

        if let (Some(summary), Some(count)) = (&cached_summary, cached_count) {
            if count >= old.len() {
                debug!(
                    session_id,
                    covered = count,
                    "Reusing cached conversation summary"
                );
                return Ok(summary.clone());
            }
        }

        info!(session_id, turns = old.len(), "Summarizing older conversation turns");
        let summary = self.summarize(old).await?;
        self.store
            .set_field(session_id, SUMMARY_FIELD, &summary)
            .await?;
        self.store
            .set_field(session_id, SUMMARIZED_COUNT_FIELD, &old.len().to_string())
            .await?;
        Ok(summary)
    }

    /// One model call over the whole old-turn prefix.
    async fn summarize(&self, old: &[Turn]) -> Result<String> {
        let mut conversation_text = String::new();
        for turn in old {
            let label = match turn.speaker {
                Speaker::User => "User",
                Speaker::Assistant => "Counselor",
            };
            conversation_text.push_str(label);
            conversation_text.push_str(": ");
            conversation_text.push_str(&turn.content);
            conversation_text.push_str("\n\n");
        }

        let request = ProviderRequest::new(
            &self.model,
            vec![
                Message::system(prompts::SUMMARIZER_SYSTEM_PROMPT),
                Message::user(prompts::summarization_prompt(&conversation_text)),
            ],
        );

        let response = self.provider.complete(request).await?;
        Ok(response.message.content.trim().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::SequentialMockProvider;
    use haven_core::message::Role;
    use haven_memory::InMemorySessionStore;

    /// One estimated token per byte keeps window math obvious in tests.
    struct ByteEstimator;

    impl TokenEstimator for ByteEstimator {
        fn count(&self, text: &str) -> usize {
            text.len()
        }
    }

    fn byte_estimator() -> Arc<dyn TokenEstimator> {
        Arc::new(ByteEstimator)
    }

    fn turns(contents: &[(Speaker, &str)]) -> Vec<Turn> {
        contents
            .iter()
            .map(|(speaker, content)| Turn::new(*speaker, *content))
            .collect()
    }

    async fn store_with_session() -> Arc<InMemorySessionStore> {
        let store = Arc::new(InMemorySessionStore::new());
        store.create("s1", "user-a").await.unwrap();
        store
    }

    fn buffer(
        store: Arc<InMemorySessionStore>,
        provider: Arc<SequentialMockProvider>,
        limit: usize,
    ) -> SummaryBuffer {
        SummaryBuffer::new(store, provider, byte_estimator(), "mock-model")
            .with_token_limit(limit)
    }

    #[tokio::test]
    async fn empty_log_compresses_to_nothing() {
        let store = store_with_session().await;
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let buf = buffer(store, provider.clone(), 100);

        let messages = buf.compress("s1", &[]).await.unwrap();
        assert!(messages.is_empty());
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn under_budget_log_passes_through_verbatim() {
        let store = store_with_session().await;
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let buf = buffer(store.clone(), provider.clone(), 100);

        let log = turns(&[
            (Speaker::User, "hi"),
            (Speaker::Assistant, "hello"),
            (Speaker::User, "how are you"),
        ]);
        let messages = buf.compress("s1", &log).await.unwrap();

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[2].content, "how are you");

        // No summary produced or cached
        assert_eq!(provider.call_count(), 0);
        assert!(store.get_field("s1", SUMMARY_FIELD).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn over_budget_log_summarizes_old_prefix() {
        let store = store_with_session().await;
        let provider = Arc::new(SequentialMockProvider::single_text(
            "We talked about loneliness.",
        ));
        // 10 bytes per turn, budget 25 → recent = last 2 turns, old = first 2
        let buf = buffer(store.clone(), provider.clone(), 25);

        let log = turns(&[
            (Speaker::User, "aaaaaaaaaa"),
            (Speaker::Assistant, "bbbbbbbbbb"),
            (Speaker::User, "cccccccccc"),
            (Speaker::Assistant, "dddddddddd"),
        ]);
        let messages = buf.compress("s1", &log).await.unwrap();

        // Summary message + 2 recent turns, chronological order preserved
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.starts_with(prompts::SUMMARY_LABEL));
        assert!(messages[0].content.contains("We talked about loneliness."));
        assert_eq!(messages[1].content, "cccccccccc");
        assert_eq!(messages[2].content, "dddddddddd");

        // Cache written: summary plus the covered-turn count
        assert_eq!(
            store.get_field("s1", SUMMARY_FIELD).await.unwrap().as_deref(),
            Some("We talked about loneliness.")
        );
        assert_eq!(
            store
                .get_field("s1", SUMMARIZED_COUNT_FIELD)
                .await
                .unwrap()
                .as_deref(),
            Some("2")
        );
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn union_of_old_and_recent_is_the_full_log() {
        let store = store_with_session().await;
        let provider = Arc::new(SequentialMockProvider::single_text("summary"));
        let buf = buffer(store.clone(), provider, 25);

        let log = turns(&[
            (Speaker::User, "aaaaaaaaaa"),
            (Speaker::Assistant, "bbbbbbbbbb"),
            (Speaker::User, "cccccccccc"),
            (Speaker::Assistant, "dddddddddd"),
        ]);
        let messages = buf.compress("s1", &log).await.unwrap();

        let covered: usize = store
            .get_field("s1", SUMMARIZED_COUNT_FIELD)
            .await
            .unwrap()
            .unwrap()
            .parse()
            .unwrap();
        let recent_count = messages.len() - 1; // minus the summary message
        assert_eq!(covered + recent_count, log.len());
    }

    #[tokio::test]
    async fn warm_cache_skips_the_summarization_call() {
        let store = store_with_session().await;
        // Only one scripted response: a second summarization call would panic
        let provider = Arc::new(SequentialMockProvider::single_text("stable summary"));
        let buf = buffer(store.clone(), provider.clone(), 25);

        let log = turns(&[
            (Speaker::User, "aaaaaaaaaa"),
            (Speaker::Assistant, "bbbbbbbbbb"),
            (Speaker::User, "cccccccccc"),
            (Speaker::Assistant, "dddddddddd"),
        ]);

        let first = buf.compress("s1", &log).await.unwrap();
        let second = buf.compress("s1", &log).await.unwrap();

        assert_eq!(provider.call_count(), 1);
        assert_eq!(first[0].content, second[0].content);
    }

    #[tokio::test]
    async fn cache_goes_stale_when_old_prefix_grows() {
        let store = store_with_session().await;
        let provider = Arc::new(SequentialMockProvider::new(vec![
            crate::test_helpers::make_text_response("first summary"),
            crate::test_helpers::make_text_response("second summary"),
        ]));
        let buf = buffer(store.clone(), provider.clone(), 25);

        let mut log = turns(&[
            (Speaker::User, "aaaaaaaaaa"),
            (Speaker::Assistant, "bbbbbbbbbb"),
            (Speaker::User, "cccccccccc"),
            (Speaker::Assistant, "dddddddddd"),
        ]);
        buf.compress("s1", &log).await.unwrap();
        assert_eq!(provider.call_count(), 1);

        // Two more turns push the old prefix from 2 to 4
        log.push(Turn::user("eeeeeeeeee"));
        log.push(Turn::assistant("ffffffffff"));
        let messages = buf.compress("s1", &log).await.unwrap();

        assert_eq!(provider.call_count(), 2);
        assert!(messages[0].content.contains("second summary"));
        assert_eq!(
            store
                .get_field("s1", SUMMARIZED_COUNT_FIELD)
                .await
                .unwrap()
                .as_deref(),
            Some("4")
        );
    }

    #[tokio::test]
    async fn missing_count_field_forces_recompute() {
        let store = store_with_session().await;
        let provider = Arc::new(SequentialMockProvider::single_text("fresh summary"));
        let buf = buffer(store.clone(), provider.clone(), 25);

        // Simulate a crash between the two cache writes: summary present,
        // covered count absent
        store
            .set_field("s1", SUMMARY_FIELD, "orphaned summary")
            .await
            .unwrap();

        let log = turns(&[
            (Speaker::User, "aaaaaaaaaa"),
            (Speaker::Assistant, "bbbbbbbbbb"),
            (Speaker::User, "cccccccccc"),
            (Speaker::Assistant, "dddddddddd"),
        ]);
        let messages = buf.compress("s1", &log).await.unwrap();

        assert_eq!(provider.call_count(), 1);
        assert!(messages[0].content.contains("fresh summary"));
    }

    #[tokio::test]
    async fn oversized_single_turn_is_still_the_recent_window() {
        let store = store_with_session().await;
        let provider = Arc::new(SequentialMockProvider::new(vec![]));
        let buf = buffer(store.clone(), provider.clone(), 25);

        // One turn far over the budget: kept verbatim, nothing to summarize
        let log = turns(&[(Speaker::User, &"z".repeat(100))]);
        let messages = buf.compress("s1", &log).await.unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(provider.call_count(), 0);
        assert!(store.get_field("s1", SUMMARY_FIELD).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_latest_turn_summarizes_the_strict_remainder() {
        let store = store_with_session().await;
        let provider = Arc::new(SequentialMockProvider::single_text("earlier talk"));
        let buf = buffer(store.clone(), provider.clone(), 25);

        let log = turns(&[
            (Speaker::User, "short"),
            (Speaker::Assistant, &"z".repeat(100)),
        ]);
        let messages = buf.compress("s1", &log).await.unwrap();

        // The oversized latest turn is the sole recent item; the earlier
        // turn becomes the summarized prefix
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.starts_with(prompts::SUMMARY_LABEL));
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(provider.call_count(), 1);
        assert_eq!(
            store
                .get_field("s1", SUMMARIZED_COUNT_FIELD)
                .await
                .unwrap()
                .as_deref(),
            Some("1")
        );
    }

    #[tokio::test]
    async fn summarization_prompt_carries_role_labels() {
        let store = store_with_session().await;
        let provider = Arc::new(SequentialMockProvider::single_text("summary"));
        let buf = buffer(store.clone(), provider.clone(), 25);

        let log = turns(&[
            (Speaker::User, "aaaaaaaaaa"),
            (Speaker::Assistant, "bbbbbbbbbb"),
            (Speaker::User, "cccccccccc"),
            (Speaker::Assistant, "dddddddddd"),
        ]);
        buf.compress("s1", &log).await.unwrap();

        let request = provider.last_request().unwrap();
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages[1].content.contains("User: aaaaaaaaaa"));
        assert!(request.messages[1].content.contains("Counselor: bbbbbbbbbb"));
    }
}
