//! Data model shared across the answer pipeline

use serde::{Deserialize, Serialize};

use crate::llm::ChatMessage;

/// Source label for context supplied by the user's text selection
pub const SELECTED_TEXT_LABEL: &str = "Selected Text";

/// Source label for the static fallback context used in degraded mode
pub const FALLBACK_LABEL: &str = "AI";

/// Source label for retrieved passages whose metadata has no name
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Marker appended to an excerpt that was cut short
pub const TRUNCATION_MARKER: &str = "...";

/// A unit of context handed to the generation step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextFragment {
    pub text: String,
    pub source_label: String,
    /// Similarity score; `None` for fragments that were not retrieved
    pub score: Option<f32>,
}

impl ContextFragment {
    /// Fragment built from text the user highlighted
    pub fn selected(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source_label: SELECTED_TEXT_LABEL.to_string(),
            score: None,
        }
    }

    /// Fragment returned by the similarity index
    pub fn retrieved(text: impl Into<String>, source_label: impl Into<String>, score: f32) -> Self {
        Self {
            text: text.into(),
            source_label: source_label.into(),
            score: Some(score),
        }
    }

    /// Static priming fragment used when retrieval is unavailable
    pub fn fallback(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source_label: FALLBACK_LABEL.to_string(),
            score: None,
        }
    }
}

/// The composed input for one generation call. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub preamble: String,
    pub context: String,
    pub question: String,
}

impl Prompt {
    /// Join fragment texts, in order, with a blank line between them
    pub fn new(
        system: impl Into<String>,
        preamble: impl Into<String>,
        fragments: &[ContextFragment],
        question: impl Into<String>,
    ) -> Self {
        let context = fragments
            .iter()
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        Self {
            system: system.into(),
            preamble: preamble.into(),
            context,
            question: question.into(),
        }
    }

    /// Text of the user turn: preamble, then context block, then the question
    pub fn user_content(&self) -> String {
        format!(
            "{}\n\nContext:\n{}\n\nUser Question: {}\n\nProvide a clear, accurate answer based on the context.",
            self.preamble, self.context, self.question
        )
    }

    pub fn to_messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system.clone()),
            ChatMessage::user(self.user_content()),
        ]
    }
}

/// Provenance entry for one fragment used to ground an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    #[serde(rename = "text")]
    pub excerpt: String,
    #[serde(rename = "source")]
    pub source_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

/// A generated answer and the sources it was grounded on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SourceRef>,
}

/// Cut `text` to at most `max_chars` characters, marker included.
///
/// Text that already fits is returned unchanged.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let marker_len = TRUNCATION_MARKER.chars().count();
    if max_chars <= marker_len {
        return text.chars().take(max_chars).collect();
    }

    let mut cut: String = text.chars().take(max_chars - marker_len).collect();
    cut.push_str(TRUNCATION_MARKER);
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    #[test]
    fn test_excerpt_short_text_unchanged() {
        let text = "A node is a process that performs computation.";
        assert_eq!(excerpt(text, 200), text);
        assert_eq!(excerpt(text, text.chars().count()), text);
    }

    #[test]
    fn test_excerpt_long_text_bounded() {
        let text = "x".repeat(500);
        let cut = excerpt(&text, 200);
        assert_eq!(cut.chars().count(), 200);
        assert!(cut.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_excerpt_counts_chars_not_bytes() {
        let text = "روبوٹ ".repeat(100);
        let cut = excerpt(&text, 50);
        assert_eq!(cut.chars().count(), 50);
        assert!(cut.ends_with(TRUNCATION_MARKER));
    }

    #[test]
    fn test_excerpt_tiny_bound() {
        assert_eq!(excerpt("abcdef", 2), "ab");
        assert_eq!(excerpt("abcdef", 0), "");
    }

    #[test]
    fn test_prompt_joins_fragments_in_order() {
        let fragments = vec![
            ContextFragment::retrieved("first", "a.md", 0.9),
            ContextFragment::retrieved("second", "b.md", 0.8),
        ];
        let prompt = Prompt::new("sys", "pre", &fragments, "q?");
        assert_eq!(prompt.context, "first\n\nsecond");
    }

    #[test]
    fn test_prompt_user_content() {
        let fragments = vec![ContextFragment::selected("A node is a process.")];
        let prompt = Prompt::new(
            "You are a helpful assistant.",
            "You are a tutor.",
            &fragments,
            "Explain this",
        );

        assert_snapshot!(prompt.user_content(), @r###"
        You are a tutor.

        Context:
        A node is a process.

        User Question: Explain this

        Provide a clear, accurate answer based on the context.
        "###);
    }

    #[test]
    fn test_prompt_messages_preamble_precedes_question() {
        let prompt = Prompt::new("sys", "PREAMBLE", &[], "QUESTION");
        let messages = prompt.to_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], ChatMessage::system("sys"));
        let user = &messages[1].content;
        assert!(user.find("PREAMBLE").unwrap() < user.find("QUESTION").unwrap());
        assert!(user.contains("Context:\n\n"));
    }

    #[test]
    fn test_source_ref_wire_shape() {
        let with_score = SourceRef {
            excerpt: "passage".into(),
            source_label: "ch1.md".into(),
            score: Some(0.5),
        };
        let without = SourceRef {
            excerpt: "passage".into(),
            source_label: SELECTED_TEXT_LABEL.into(),
            score: None,
        };
        assert_eq!(
            serde_json::to_value(&with_score).unwrap(),
            serde_json::json!({"text": "passage", "source": "ch1.md", "score": 0.5})
        );
        assert_eq!(
            serde_json::to_value(&without).unwrap(),
            serde_json::json!({"text": "passage", "source": "Selected Text"})
        );
    }
}
