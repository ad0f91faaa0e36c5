//! Core data models shared by the indexing and answering pipeline.
//!
//! Documents and chunks flow from the corpus loader into the embedding
//! index; [`Answer`] is the single result shape every answer path returns.

use serde::Serialize;

/// Raw text of one knowledge-base file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Path of the file relative to the knowledge-base directory.
    pub source: String,
    pub text: String,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text: text.into(),
        }
    }
}

/// A bounded slice of a document's text, the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Source identifier of the parent document.
    pub source: String,
    /// Position within the parent document, contiguous from 0.
    pub index: usize,
    /// Character offset of the first character of `text` in the document.
    pub start: usize,
    pub text: String,
}

impl Chunk {
    /// Stable identifier, e.g. `"sites/malpelo.yaml#3"`.
    pub fn id(&self) -> String {
        format!("{}#{}", self.source, self.index)
    }

    /// Length of the chunk in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A chunk paired with its similarity to a query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub score: f32,
}

/// Logical author of an [`Answer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Assistant,
}

/// How an [`Answer`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// The language model produced the content.
    Generated,
    /// The knowledge base could not be initialized; content is a fixed apology.
    Unavailable,
    /// Retrieval or generation failed; content is a fixed apology.
    Failed,
}

/// The normalized result of answering one user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub role: Role,
    pub content: String,
    pub outcome: AnswerOutcome,
}

impl Answer {
    pub fn generated(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            outcome: AnswerOutcome::Generated,
        }
    }

    pub fn fallback(outcome: AnswerOutcome, content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            outcome,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.outcome != AnswerOutcome::Generated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id() {
        let chunk = Chunk {
            source: "sites/malpelo.yaml".into(),
            index: 3,
            start: 120,
            text: "Tiburones martillo".into(),
        };
        assert_eq!(chunk.id(), "sites/malpelo.yaml#3");
    }

    #[test]
    fn test_char_len_counts_chars_not_bytes() {
        let chunk = Chunk {
            source: "a".into(),
            index: 0,
            start: 0,
            text: "buceo en Providencia: ñandú".into(),
        };
        assert_eq!(chunk.char_len(), 27);
        assert!(chunk.text.len() > 27);
    }

    #[test]
    fn test_answer_serializes_role_lowercase() {
        let answer = Answer::generated("Hola");
        let json = serde_json::to_string(&answer).unwrap();
        assert!(json.contains("\"role\":\"assistant\""));
        assert!(json.contains("\"outcome\":\"generated\""));
        assert!(!answer.is_fallback());
    }

    #[test]
    fn test_fallback_flag() {
        let answer = Answer::fallback(AnswerOutcome::Failed, "Lo siento");
        assert!(answer.is_fallback());
        assert_eq!(answer.role, Role::Assistant);
    }
}
