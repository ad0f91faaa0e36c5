//! Prompt composition for the diving assistant.

use std::fmt;

use crate::models::Chunk;

/// Persona and instructions sent ahead of every question.
pub const PERSONA: &str = "You are a polite, customer-focused scuba diving assistant for Colombia. \
Always answer in a friendly and helpful way.

Guidelines:
- Base your answer on the context below; it comes from dive trip reports across Colombia
- If the context does not contain the answer, say so honestly instead of guessing
- Answer in the same language the user writes in
- Be concise and practical: sites, seasons, certification levels, logistics";

/// Inserted in place of the context when retrieval found nothing.
pub const EMPTY_CONTEXT: &str = "(no relevant context found)";

/// A fully assembled prompt: persona, retrieved context, user question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub preamble: String,
    pub context: String,
    pub question: String,
}

impl Prompt {
    /// Compose a prompt with the default [`PERSONA`].
    pub fn compose(chunks: &[Chunk], question: &str) -> Self {
        Self::with_preamble(PERSONA, chunks, question)
    }

    pub fn with_preamble(preamble: &str, chunks: &[Chunk], question: &str) -> Self {
        Self {
            preamble: preamble.to_string(),
            context: build_context(chunks),
            question: question.trim().to_string(),
        }
    }

    /// System message for chat-style APIs.
    pub fn system_message(&self) -> &str {
        &self.preamble
    }

    /// User message for chat-style APIs: context plus question.
    pub fn user_message(&self) -> String {
        format!(
            "Contexto:\n{}\n\nPregunta del usuario: {}",
            self.context, self.question
        )
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n\n{}", self.preamble, self.user_message())
    }
}

/// Join chunk texts with blank lines, or return [`EMPTY_CONTEXT`].
pub fn build_context(chunks: &[Chunk]) -> String {
    let parts: Vec<&str> = chunks
        .iter()
        .map(|c| c.text.trim())
        .filter(|t| !t.is_empty())
        .collect();

    if parts.is_empty() {
        return EMPTY_CONTEXT.to_string();
    }

    parts.join("\n\n")
}
