//! Context assembler — merges every context source into one ordered
//! message sequence for a single completion.
//!
//! Assembly is pure formatting over already-ranked inputs: no reordering,
//! no deduplication, no re-ranking. Fixed order:
//!
//! 1. Base system instructions
//! 2. Retrieved knowledge, as a labeled block (when present)
//! 3. Retrieved diary excerpts, as a labeled block (when present)
//! 4. — 1-3 collapse into a single system message —
//! 5. Buffered history messages, verbatim
//! 6. The current user turn, last
//!
//! # Determinism
//!
//! Identical inputs always produce identical output content and ordering.
//! No random or time-dependent logic participates in assembly.

use haven_core::message::Message;
use haven_core::retrieval::RetrievedItem;

use crate::prompts::{DIARY_HEADER, KNOWLEDGE_HEADER};

/// Number of characters of a diary excerpt shown in context.
const DIARY_EXCERPT_CHARS: usize = 200;

/// The context assembler. Stateless apart from the persona — create one
/// and reuse it.
pub struct ContextAssembler {
    system_prompt: String,
}

impl ContextAssembler {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
        }
    }

    /// Merge all context sources into the final ordered message sequence.
    ///
    /// An empty knowledge snippet is treated as absent. Diary excerpts are
    /// rendered in retrieval order with their creation date (or "unknown")
    /// and a hard 200-character cut — not word-boundary aware.
    pub fn assemble(
        &self,
        knowledge_snippet: Option<&str>,
        diary_items: &[RetrievedItem],
        buffered_messages: &[Message],
        current_message: &str,
    ) -> Vec<Message> {
        let mut system_content = self.system_prompt.clone();

        if let Some(snippet) = knowledge_snippet.filter(|s| !s.is_empty()) {
            system_content.push_str("\n\n");
            system_content.push_str(KNOWLEDGE_HEADER);
            system_content.push('\n');
            system_content.push_str(snippet);
        }

        if !diary_items.is_empty() {
            system_content.push_str("\n\n");
            system_content.push_str(DIARY_HEADER);
            system_content.push('\n');
            for (idx, item) in diary_items.iter().enumerate() {
                let created_at = item.created_at().unwrap_or("unknown");
                let excerpt = truncate_chars(&item.content, DIARY_EXCERPT_CHARS);
                system_content.push_str(&format!("{}. [{}] {}...\n", idx + 1, created_at, excerpt));
            }
        }

        let mut messages = Vec::with_capacity(buffered_messages.len() + 2);
        messages.push(Message::system(system_content));
        messages.extend(buffered_messages.iter().cloned());
        messages.push(Message::user(current_message));
        messages
    }
}

/// Cut `text` to at most `limit` characters. Counts `char`s, not bytes,
/// so multi-byte content is never split mid-codepoint.
fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
