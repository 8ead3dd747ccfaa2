//! Structured diary types.
//!
//! `CbtRecord` is the structured extraction of a counseling conversation —
//! situation, thoughts, emotions, behaviors — produced by the first diary
//! pipeline stage and consumed by the later ones. `DiaryResult` is the
//! pipeline's final output.

use serde::{Deserialize, Serialize};

/// One automatic thought extracted from a conversation.
///
/// Model output represents thoughts either as bare strings or as objects
/// with a `text` field; both forms normalize into this struct at the
/// deserialization boundary so downstream code sees a single shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ThoughtRepr")]
pub struct Thought {
    pub text: String,
}

impl Thought {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ThoughtRepr {
    Plain(String),
    Tagged { text: String },
}

impl From<ThoughtRepr> for Thought {
    fn from(repr: ThoughtRepr) -> Self {
        match repr {
            ThoughtRepr::Plain(text) => Thought { text },
            ThoughtRepr::Tagged { text } => Thought { text },
        }
    }
}

/// Structured situation/thought/emotion/behavior extraction, per the CBT
/// framing of the counseling dialogue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CbtRecord {
    #[serde(default)]
    pub situation: String,

    #[serde(default)]
    pub thoughts: Vec<Thought>,

    #[serde(default)]
    pub emotions: Vec<String>,

    #[serde(default)]
    pub behaviors: Vec<String>,
}

/// Final output of the diary pipeline.
///
/// Always a displayable result: when extraction cannot parse the model's
/// output, `diary_text` carries a fixed failure message and `diagnostic`
/// carries the raw output for debugging — the pipeline never raises for
/// malformed model output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiaryResult {
    /// First-person diary narrative.
    pub diary_text: String,

    /// Short alternative perspective on the extracted thoughts; empty when
    /// the conversation surfaced no thoughts.
    pub alternative_perspective: String,

    /// Present only when the pipeline degraded to a fixed message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thought_from_plain_string() {
        let t: Thought = serde_json::from_str("\"I always ruin things\"").unwrap();
        assert_eq!(t.text, "I always ruin things");
    }

    #[test]
    fn thought_from_tagged_object() {
        let t: Thought = serde_json::from_str(r#"{"text": "Nobody wants me around"}"#).unwrap();
        assert_eq!(t.text, "Nobody wants me around");
    }

    #[test]
    fn record_accepts_mixed_thought_forms() {
        let json = r#"{
            "situation": "Skipped a family dinner",
            "thoughts": ["They are better off without me", {"text": "I can't face them"}],
            "emotions": ["guilt", "relief"],
            "behaviors": ["stayed in my room"]
        }"#;
        let record: CbtRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.thoughts.len(), 2);
        assert_eq!(record.thoughts[0].text, "They are better off without me");
        assert_eq!(record.thoughts[1].text, "I can't face them");
    }

    #[test]
    fn record_missing_fields_default_empty() {
        let record: CbtRecord = serde_json::from_str("{}").unwrap();
        assert!(record.situation.is_empty());
        assert!(record.thoughts.is_empty());
        assert!(record.emotions.is_empty());
        assert!(record.behaviors.is_empty());
    }

    #[test]
    fn record_serializes_thoughts_as_objects() {
        let record = CbtRecord {
            situation: "test".into(),
            thoughts: vec![Thought::new("a thought")],
            emotions: vec![],
            behaviors: vec![],
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains(r#"{"text":"a thought"}"#));
    }
}
