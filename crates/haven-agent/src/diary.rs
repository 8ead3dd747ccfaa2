//! Diary extraction pipeline.
//!
//! Turns a full conversation transcript into a structured CBT record, a
//! short reinterpretation of the user's thoughts, and a first-person
//! diary entry — three model calls, each consuming the prior stage's
//! output.
//!
//! The pipeline always hands the caller a displayable result: a transcript
//! that defeats extraction produces a fixed failure message plus a
//! diagnostic, never an error. Only provider transport failures propagate.

use std::sync::Arc;
use tracing::{debug, info, warn};

use haven_core::diary::{CbtRecord, DiaryResult};
use haven_core::error::Result;
use haven_core::message::Message;
use haven_core::provider::{Provider, ProviderRequest};
use haven_core::session::{Speaker, Turn};

use crate::prompts;

/// Shown when a session has no turns to work from.
pub const NO_CONTENT_MESSAGE: &str =
    "There is no conversation to turn into a diary entry yet.";

/// Shown when the extraction stage cannot produce a structured record.
pub const EXTRACTION_FAILURE_MESSAGE: &str =
    "We couldn't turn this conversation into a diary entry this time. \
Please try again after your next conversation.";

/// What the extraction stage made of the raw model output.
enum Extraction {
    Record(CbtRecord),
    Unparsable { raw: String },
}

/// The three-stage transcript → diary pipeline.
pub struct DiaryPipeline {
    provider: Arc<dyn Provider>,
    model: String,
}

impl DiaryPipeline {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Run the full pipeline over a transcript.
    ///
    /// An empty transcript short-circuits before any model call.
    pub async fn generate(&self, transcript: &[Turn]) -> Result<DiaryResult> {
        if transcript.is_empty() {
            debug!("Empty transcript, returning the fixed no-content result");
            return Ok(DiaryResult {
                diary_text: NO_CONTENT_MESSAGE.into(),
                alternative_perspective: String::new(),
                diagnostic: None,
            });
        }

        let transcript_text = render_transcript(transcript);

        let record = match self.extract(&transcript_text).await? {
            Extraction::Record(record) => record,
            Extraction::Unparsable { raw } => {
                warn!("Diary extraction output was not parsable JSON");
                return Ok(DiaryResult {
                    diary_text: EXTRACTION_FAILURE_MESSAGE.into(),
                    alternative_perspective: String::new(),
                    diagnostic: Some(format!("unparsable extraction output: {raw}")),
                });
            }
        };

        let alternative_perspective = self.reinterpret(&record).await?;
        let diary_text = self.compose(&record).await?;

        info!(
            thoughts = record.thoughts.len(),
            emotions = record.emotions.len(),
            "Diary generated"
        );

        Ok(DiaryResult {
            diary_text,
            alternative_perspective,
            diagnostic: None,
        })
    }

    /// Stage 1: transcript → structured record, requested as JSON.
    async fn extract(&self, transcript_text: &str) -> Result<Extraction> {
        let request = ProviderRequest::new(
            &self.model,
            vec![
                Message::system(prompts::EXTRACTOR_SYSTEM_PROMPT),
                Message::user(prompts::extraction_prompt(transcript_text)),
            ],
        )
        .with_temperature(0.0);

        let raw = self.provider.complete(request).await?.message.content;

        Ok(match parse_record(&raw) {
            Some(record) => Extraction::Record(record),
            None => Extraction::Unparsable { raw },
        })
    }

    /// Stage 2: thoughts → 1-2 sentence alternative perspective. Skipped
    /// (empty result) when the record carries no thoughts.
    async fn reinterpret(&self, record: &CbtRecord) -> Result<String> {
        if record.thoughts.is_empty() {
            debug!("No thoughts extracted, skipping reinterpretation");
            return Ok(String::new());
        }

        let thoughts_text = record
            .thoughts
            .iter()
            .map(|t| format!("- {}", t.text))
            .collect::<Vec<_>>()
            .join("\n");

        let request = ProviderRequest::new(
            &self.model,
            vec![
                Message::system(prompts::REINTERPRETER_SYSTEM_PROMPT),
                Message::user(prompts::reinterpretation_prompt(&thoughts_text)),
            ],
        );

        let response = self.provider.complete(request).await?;
        Ok(response.message.content.trim().to_owned())
    }

    /// Stage 3: the serialized record → first-person, advice-free narrative.
    async fn compose(&self, record: &CbtRecord) -> Result<String> {
        let record_json = serde_json::to_string_pretty(record)?;

        let request = ProviderRequest::new(
            &self.model,
            vec![
                Message::system(prompts::DIARY_WRITER_SYSTEM_PROMPT),
                Message::user(prompts::diary_prompt(&record_json)),
            ],
        );

        let response = self.provider.complete(request).await?;
        Ok(response.message.content.trim().to_owned())
    }
}

/// Render a transcript with first-person role labels.
fn render_transcript(transcript: &[Turn]) -> String {
    let mut text = String::new();
    for turn in transcript {
        let label = match turn.speaker {
            Speaker::User => "Me",
            Speaker::Assistant => "Counselor",
        };
        text.push_str(label);
        text.push_str(": ");
        text.push_str(&turn.content);
        text.push('\n');
    }
    text
}

/// Recover a structured record from raw model output.
///
/// The output is not trusted to be pure JSON — it may be wrapped in code
/// fences or prose. Recovery takes the greedy span from the first `{` to
/// the last `}` and parses that; failing that, a trimmed output that
/// itself starts with `{` gets one direct parse attempt.
fn parse_record(raw: &str) -> Option<CbtRecord> {
    if let Some(span) = json_span(raw) {
        return serde_json::from_str(span).ok();
    }
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        return serde_json::from_str(trimmed).ok();
    }
    None
}

fn json_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}
