//! Query text → most relevant chunks.
//!
//! The [`Retriever`] trait is the seam the answer generator talks to;
//! [`IndexRetriever`] is the production implementation backed by an
//! [`EmbeddingIndex`] and the same [`Embedder`] that built it.

use async_trait::async_trait;
use std::sync::Arc;

use crate::embedding::{EmbedError, Embedder};
use crate::index::EmbeddingIndex;
use crate::models::Chunk;

/// Number of chunks retrieved per question unless configured otherwise.
pub const DEFAULT_TOP_K: usize = 4;

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return the most relevant chunks for `query`, most relevant first.
    async fn retrieve(&self, query: &str) -> Result<Vec<Chunk>, EmbedError>;
}

pub struct IndexRetriever {
    index: Arc<EmbeddingIndex>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl IndexRetriever {
    pub fn new(index: Arc<EmbeddingIndex>, embedder: Arc<dyn Embedder>, top_k: usize) -> Self {
        Self {
            index,
            embedder,
            top_k,
        }
    }

    pub fn index(&self) -> &EmbeddingIndex {
        &self.index
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }
}

#[async_trait]
impl Retriever for IndexRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<Chunk>, EmbedError> {
        if self.index.is_empty() || self.top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self.embedder.embed_query(query).await?;
        let hits = self.index.query(&query_vec, self.top_k);

        tracing::debug!(
            hits = hits.len(),
            best = hits.first().map(|h| h.score).unwrap_or(0.0),
            "retrieved context"
        );

        Ok(hits.into_iter().map(|h| h.chunk).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct KeywordEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        fn model_name(&self) -> &str {
            "keyword"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    vec![
                        if t.contains("ballena") { 1.0 } else { 0.0 },
                        if t.contains("naufragio") { 1.0 } else { 0.0 },
                    ]
                })
                .collect())
        }
    }

    fn chunk(source: &str, text: &str) -> Chunk {
        Chunk {
            source: source.into(),
            index: 0,
            start: 0,
            text: text.into(),
        }
    }

    async fn retriever(chunks: Vec<Chunk>, top_k: usize) -> (IndexRetriever, Arc<KeywordEmbedder>) {
        let embedder = Arc::new(KeywordEmbedder {
            calls: AtomicUsize::new(0),
        });
        let index = EmbeddingIndex::build(chunks, embedder.as_ref(), 16)
            .await
            .unwrap();
        (
            IndexRetriever::new(Arc::new(index), embedder.clone(), top_k),
            embedder,
        )
    }

    #[tokio::test]
    async fn test_retrieve_returns_relevant_first() {
        let (r, _) = retriever(
            vec![
                chunk("santa-marta.yaml", "naufragio del Morrocoy"),
                chunk("gorgona.yaml", "ballena jorobada en Gorgona"),
            ],
            1,
        )
        .await;
        let hits = r.retrieve("¿Dónde veo una ballena?").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, "gorgona.yaml");
    }

    #[tokio::test]
    async fn test_retrieve_on_empty_index_is_empty() {
        let (r, embedder) = retriever(Vec::new(), DEFAULT_TOP_K).await;
        let hits = r.retrieve("ballena").await.unwrap();
        assert!(hits.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retrieve_is_repeatable() {
        let (r, _) = retriever(
            vec![
                chunk("a.yaml", "ballena"),
                chunk("b.yaml", "naufragio"),
                chunk("c.yaml", "ballena y naufragio"),
            ],
            2,
        )
        .await;
        let first = r.retrieve("ballena").await.unwrap();
        let second = r.retrieve("ballena").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].source, "a.yaml");
        assert_eq!(first[1].source, "c.yaml");
    }
}
