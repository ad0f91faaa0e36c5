//! Error taxonomy of the answering pipeline.
//!
//! None of these reach an HTTP client: the answer generator logs them and
//! turns them into fallback answers. Authentication errors live in
//! [`crate::auth::AuthError`].

use std::path::PathBuf;

use scuba_rag_core::chunk::ChunkError;
use scuba_rag_core::embedding::EmbedError;
use thiserror::Error;

use crate::llm::LlmError;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("Corpus load; {path}: {reason}")]
    CorpusLoad { path: PathBuf, reason: String },

    #[error("Config; {0}")]
    Config(String),

    #[error("Embedding provider; {0}")]
    Embedding(#[from] EmbedError),

    #[error("LLM provider; {0}")]
    Llm(#[from] LlmError),
}

impl RagError {
    pub fn corpus(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        RagError::CorpusLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<ChunkError> for RagError {
    fn from(err: ChunkError) -> Self {
        RagError::Config(err.to_string())
    }
}

impl From<globset::Error> for RagError {
    fn from(err: globset::Error) -> Self {
        RagError::Config(format!("invalid include glob: {}", err))
    }
}
