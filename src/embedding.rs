//! Embedding provider implementations.
//!
//! Concrete [`Embedder`]s selected by `[embedding].provider`:
//! - **[`OpenAIEmbedder`]**: `POST /v1/embeddings` with batching, retry and backoff.
//! - **[`OllamaEmbedder`]**: a local Ollama instance's `/api/embed` endpoint.
//! - **[`HashingEmbedder`]**: deterministic feature hashing, no network.
//! - **[`DisabledEmbedder`]**: always errors; chat answers fall back.
//!
//! Credentials are read at call time, so a missing `OPENAI_API_KEY`
//! degrades answers instead of preventing the server from starting.
//!
//! ```rust,no_run
//! # use scuba_rag::config::EmbeddingConfig;
//! # use scuba_rag::embedding::create_embedder;
//! let config = EmbeddingConfig::default(); // provider = "openai"
//! let embedder = create_embedder(&config).unwrap();
//! assert_eq!(embedder.model_name(), "text-embedding-3-small");
//! ```

use anyhow::{bail, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use scuba_rag_core::embedding::{EmbedError, Embedder};

use crate::config::EmbeddingConfig;
use crate::retry::{self, HttpError, JsonEndpoint};

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_HASHING_DIMS: usize = 256;

/// Instantiate the embedder named by the configuration.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        "hashing" => Ok(Arc::new(HashingEmbedder::new(
            config.dims.unwrap_or(DEFAULT_HASHING_DIMS),
        ))),
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

impl From<HttpError> for EmbedError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Decode { reason, .. } => EmbedError::Malformed(reason),
            other => EmbedError::Request(other.to_string()),
        }
    }
}

// ============ Disabled Provider ============

/// A no-op embedder that always returns errors.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Err(EmbedError::Disabled)
    }
}

// ============ OpenAI Provider ============

/// Embedder using the OpenAI API.
///
/// Requires the `OPENAI_API_KEY` environment variable at call time.
pub struct OpenAIEmbedder {
    model: String,
    dims: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for OpenAI provider"))?;

        Ok(Self {
            model,
            dims,
            max_retries: config.max_retries,
            client: retry::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| EmbedError::MissingCredentials("OPENAI_API_KEY not set".into()))?;

        let endpoint = JsonEndpoint {
            service: "OpenAI",
            url: OPENAI_EMBEDDINGS_URL.to_string(),
            bearer: Some(api_key),
            max_retries: self.max_retries,
        };
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let json = retry::post_json(&self.client, &endpoint, &body).await?;
        parse_openai_response(&json)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, EmbedError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| EmbedError::Malformed("missing data array".into()))?;

    let mut indexed = Vec::with_capacity(data.len());

    for (pos, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| EmbedError::Malformed("missing embedding".into()))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);

        indexed.push((index, to_f32_vec(embedding)));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

fn to_f32_vec(values: &[serde_json::Value]) -> Vec<f32> {
    values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect()
}

// ============ Ollama Provider ============

/// Embedder using a local Ollama instance (default `http://localhost:11434`).
pub struct OllamaEmbedder {
    model: String,
    dims: usize,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());

        Ok(Self {
            model,
            dims,
            url,
            max_retries: config.max_retries,
            client: retry::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let endpoint = JsonEndpoint {
            service: "Ollama",
            url: format!("{}/api/embed", self.url.trim_end_matches('/')),
            bearer: None,
            max_retries: self.max_retries,
        };
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let json = retry::post_json(&self.client, &endpoint, &body).await?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, EmbedError> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| EmbedError::Malformed("missing embeddings array".into()))?;

    embeddings
        .iter()
        .map(|embedding| {
            embedding
                .as_array()
                .map(|values| to_f32_vec(values))
                .ok_or_else(|| EmbedError::Malformed("embedding is not an array".into()))
        })
        .collect()
}

// ============ Hashing Provider ============

/// Deterministic bag-of-words embedder.
///
/// Each lower-cased alphanumeric token is hashed with SHA-256 into one of
/// `dims` buckets; the result is L2-normalised. Texts sharing words get
/// positive cosine similarity, which is enough for offline development
/// and tests.
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];

        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let bucket = u64::from_le_bytes([
                digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6],
                digest[7],
            ]) as usize
                % self.dims;
            v[bucket] += 1.0;
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        "hashing"
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
