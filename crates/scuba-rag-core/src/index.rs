//! Immutable in-memory embedding index.
//!
//! Built once from all corpus chunks, then only read. Search is
//! brute-force cosine similarity over every stored vector, which is
//! plenty for a knowledge base of a few hundred chunks.
//!
//! The index is a plain value: there is no way to add or mutate entries
//! after [`EmbeddingIndex::build`] returns, so sharing it behind an `Arc`
//! is safe for any number of concurrent readers.

use crate::embedding::{cosine_similarity, EmbedError, Embedder};
use crate::models::{Chunk, ScoredChunk};

/// Default number of chunks sent to the embedder per request.
pub const DEFAULT_BATCH_SIZE: usize = 64;

#[derive(Debug, Clone)]
struct IndexEntry {
    chunk: Chunk,
    vector: Vec<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct EmbeddingIndex {
    entries: Vec<IndexEntry>,
    dims: usize,
}

impl EmbeddingIndex {
    /// Embed every chunk and store the (chunk, vector) pairs in input order.
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: &dyn Embedder,
        batch_size: usize,
    ) -> Result<Self, EmbedError> {
        let batch_size = batch_size.max(1);
        let mut entries = Vec::with_capacity(chunks.len());
        let mut dims = 0usize;

        let mut remaining = chunks.into_iter().peekable();
        while remaining.peek().is_some() {
            let batch: Vec<Chunk> = remaining.by_ref().take(batch_size).collect();
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = embedder.embed(&texts).await?;

            if vectors.len() != batch.len() {
                return Err(EmbedError::Malformed(format!(
                    "expected {} vectors, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }

            for (chunk, vector) in batch.into_iter().zip(vectors) {
                if dims == 0 {
                    dims = vector.len();
                } else if vector.len() != dims {
                    return Err(EmbedError::Malformed(format!(
                        "inconsistent dimensions: {} vs {}",
                        dims,
                        vector.len()
                    )));
                }
                entries.push(IndexEntry { chunk, vector });
            }
        }

        tracing::info!(
            entries = entries.len(),
            dims,
            model = embedder.model_name(),
            "embedding index built"
        );

        Ok(Self { entries, dims })
    }

    /// Return the `k` chunks nearest to `vector`, nearest first.
    ///
    /// Ties keep corpus order.
    pub fn query(&self, vector: &[f32], k: usize) -> Vec<ScoredChunk> {
        if k == 0 || self.entries.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(pos, e)| (pos, cosine_similarity(vector, &e.vector)))
            .collect();

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(pos, score)| ScoredChunk {
                chunk: self.entries[pos].chunk.clone(),
                score,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector dimensionality, `0` for an empty index.
    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|e| &e.chunk)
    }
}
