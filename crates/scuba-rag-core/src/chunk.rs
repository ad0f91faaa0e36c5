//! Overlapping sliding-window text chunker.
//!
//! Splits document text into [`Chunk`]s of a fixed target length with a
//! fixed overlap between consecutive chunks, so that a sentence cut at a
//! boundary still appears whole in one of its neighbours.
//!
//! # Algorithm
//!
//! 1. Convert the configured token budget to characters using a
//!    4 chars/token ratio ([`ChunkParams::from_tokens`]).
//! 2. Work on Unicode scalar values, never bytes, so multi-byte text is
//!    never split inside a character.
//! 3. With `step = size - overlap`, chunk `i` covers characters
//!    `[i * step, min(i * step + size, len))`.
//! 4. Stop after the first chunk whose end reaches the end of the text.
//!
//! Every character is covered by at least one chunk, consecutive chunks
//! share exactly `overlap` characters (the last one may share more), and
//! the output depends only on the input text and parameters.
//!
//! # Example
//!
//! ```rust
//! use scuba_rag_core::chunk::{chunk_document, ChunkParams};
//! use scuba_rag_core::models::Document;
//!
//! let doc = Document::new("sites.yaml", "abcdefghij");
//! let chunks = chunk_document(&doc, ChunkParams::new(4, 1)).unwrap();
//! let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
//! assert_eq!(texts, ["abcd", "defg", "ghij"]);
//! ```

use thiserror::Error;

use crate::models::{Chunk, Document};

/// Approximate characters-per-token ratio.
pub const CHARS_PER_TOKEN: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("invalid chunking parameters: size={size}, overlap={overlap} (need 0 <= overlap < size)")]
    InvalidParams { size: usize, overlap: usize },
}

/// Chunk length and overlap, both in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    pub size: usize,
    pub overlap: usize,
}

impl ChunkParams {
    pub fn new(size: usize, overlap: usize) -> Self {
        Self { size, overlap }
    }

    /// Build parameters from a token budget.
    ///
    /// Budgets too large to express in characters are rejected as invalid.
    pub fn from_tokens(max_tokens: usize, overlap_tokens: usize) -> Result<Self, ChunkError> {
        let invalid = || ChunkError::InvalidParams {
            size: max_tokens,
            overlap: overlap_tokens,
        };
        Ok(Self {
            size: max_tokens.checked_mul(CHARS_PER_TOKEN).ok_or_else(invalid)?,
            overlap: overlap_tokens
                .checked_mul(CHARS_PER_TOKEN)
                .ok_or_else(invalid)?,
        })
    }

    pub fn validate(&self) -> Result<(), ChunkError> {
        if self.size == 0 || self.overlap >= self.size {
            return Err(ChunkError::InvalidParams {
                size: self.size,
                overlap: self.overlap,
            });
        }
        Ok(())
    }

    fn step(&self) -> usize {
        self.size - self.overlap
    }
}

/// Split one document into overlapping chunks.
///
/// Empty or whitespace-only documents produce no chunks.
pub fn chunk_document(doc: &Document, params: ChunkParams) -> Result<Vec<Chunk>, ChunkError> {
    params.validate()?;

    if doc.text.trim().is_empty() {
        return Ok(Vec::new());
    }

    // Byte offset of every char, plus the end of the string.
    let mut bounds: Vec<usize> = doc.text.char_indices().map(|(i, _)| i).collect();
    let len = bounds.len();
    bounds.push(doc.text.len());

    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let end = (start + params.size).min(len);
        chunks.push(Chunk {
            source: doc.source.clone(),
            index: chunks.len(),
            start,
            text: doc.text[bounds[start]..bounds[end]].to_string(),
        });
        if end == len {
            break;
        }
        start += params.step();
    }

    Ok(chunks)
}

/// Chunk every document, preserving document order.
pub fn chunk_documents(docs: &[Document], params: ChunkParams) -> Result<Vec<Chunk>, ChunkError> {
    params.validate()?;

    let mut all = Vec::new();
    for doc in docs {
        all.extend(chunk_document(doc, params)?);
    }

    tracing::debug!(
        documents = docs.len(),
        chunks = all.len(),
        size = params.size,
        overlap = params.overlap,
        "chunked corpus"
    );

    Ok(all)
}
