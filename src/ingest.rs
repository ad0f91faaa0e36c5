//! Knowledge-base indexing pipeline.
//!
//! load → chunk → embed → index. The result is a ready [`Retriever`]
//! the answer generator installs on first use.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use scuba_rag_core::chunk::chunk_documents;
use scuba_rag_core::embedding::Embedder;
use scuba_rag_core::index::EmbeddingIndex;
use scuba_rag_core::retriever::{IndexRetriever, Retriever};

use crate::config::{ChunkingConfig, Config};
use crate::corpus::load_corpus;
use crate::error::RagError;

/// Builds the retriever the answer generator works against.
#[async_trait]
pub trait RetrieverSource: Send + Sync {
    async fn build(&self) -> Result<Arc<dyn Retriever>, RagError>;
}

/// Counts reported after an index build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub documents: usize,
    pub chunks: usize,
    pub dims: usize,
}

/// The production [`RetrieverSource`]: reads the knowledge-base directory
/// and embeds it with the configured provider.
pub struct CorpusPipeline {
    dir: PathBuf,
    include_globs: Vec<String>,
    chunking: ChunkingConfig,
    batch_size: usize,
    top_k: usize,
    embedder: Arc<dyn Embedder>,
}

impl CorpusPipeline {
    pub fn new(config: &Config, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            dir: config.knowledge_base.dir.clone(),
            include_globs: config.knowledge_base.include_globs.clone(),
            chunking: config.chunking.clone(),
            batch_size: config.embedding.batch_size,
            top_k: config.retrieval.top_k,
            embedder,
        }
    }

    /// Run the pipeline, returning the built retriever and its stats.
    pub async fn build_index(&self) -> Result<(IndexRetriever, IndexStats), RagError> {
        let params = self.chunking.params()?;

        let docs = load_corpus(&self.dir, &self.include_globs)?;
        let chunks = chunk_documents(&docs, params)?;
        let chunk_count = chunks.len();

        let index =
            EmbeddingIndex::build(chunks, self.embedder.as_ref(), self.batch_size).await?;

        let stats = IndexStats {
            documents: docs.len(),
            chunks: chunk_count,
            dims: index.dims(),
        };

        tracing::info!(
            documents = stats.documents,
            chunks = stats.chunks,
            dims = stats.dims,
            "knowledge base indexed"
        );

        let retriever = IndexRetriever::new(Arc::new(index), self.embedder.clone(), self.top_k);
        Ok((retriever, stats))
    }
}

#[async_trait]
impl RetrieverSource for CorpusPipeline {
    async fn build(&self) -> Result<Arc<dyn Retriever>, RagError> {
        let (retriever, _) = self.build_index().await?;
        Ok(Arc::new(retriever))
    }
}
