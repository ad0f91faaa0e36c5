use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use scuba_rag_core::chunk::{ChunkError, ChunkParams};

/// Development signing secret. A warning is logged whenever it is used.
pub const DEV_SECRET: &str = "default_key_for_dev";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub knowledge_base: KnowledgeBaseConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeBaseConfig {
    pub dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
}

fn default_include_globs() -> Vec<String> {
    vec!["*.yaml".to_string(), "*.yml".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_overlap")]
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            overlap_tokens: default_overlap(),
        }
    }
}

impl ChunkingConfig {
    pub fn params(&self) -> Result<ChunkParams, ChunkError> {
        let params = ChunkParams::from_tokens(self.max_tokens, self.overlap_tokens)?;
        params.validate()?;
        Ok(params)
    }
}

fn default_max_tokens() -> usize {
    100
}
fn default_overlap() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    scuba_rag_core::retriever::DEFAULT_TOP_K
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: Some("text-embedding-3-small".to_string()),
            dims: Some(1536),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_batch_size() -> usize {
    scuba_rag_core::index::DEFAULT_BATCH_SIZE
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_llm_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            temperature: 0.0,
            max_tokens: None,
            max_retries: default_llm_retries(),
            timeout_secs: default_llm_timeout(),
            url: None,
        }
    }
}

fn default_llm_provider() -> String {
    "openai".to_string()
}
fn default_llm_model() -> String {
    "gpt-4.1".to_string()
}
fn default_llm_retries() -> u32 {
    3
}
fn default_llm_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Token signing secret; the `SECRET_KEY` environment variable wins.
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_minutes: i64,
    #[serde(default = "default_hash_iterations")]
    pub hash_iterations: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: None,
            token_ttl_minutes: default_token_ttl(),
            hash_iterations: default_hash_iterations(),
        }
    }
}

impl AuthConfig {
    /// Resolve the signing secret: `SECRET_KEY` env, then config, then [`DEV_SECRET`].
    pub fn resolve_secret(&self) -> String {
        if let Ok(secret) = std::env::var("SECRET_KEY") {
            if !secret.is_empty() {
                return secret;
            }
        }
        match &self.secret {
            Some(secret) if !secret.is_empty() => secret.clone(),
            _ => {
                tracing::warn!("no SECRET_KEY configured, using the development secret");
                DEV_SECRET.to_string()
            }
        }
    }
}

fn default_token_ttl() -> i64 {
    120
}
fn default_hash_iterations() -> u32 {
    100_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origins: default_cors_origins(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}
fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:3001".to_string()]
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;

    Ok(config)
}

/// Checks everything except chunking, which is validated when the
/// knowledge base is indexed so that a bad value degrades the chat
/// endpoint instead of preventing start-up.
pub fn validate(config: &Config) -> Result<()> {
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if config.embedding.batch_size < 1 {
        anyhow::bail!("embedding.batch_size must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        "hashing" => {
            if config.embedding.dims == Some(0) {
                anyhow::bail!("embedding.dims must be > 0 when provider is 'hashing'");
            }
        }
        "disabled" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be openai, ollama, hashing, or disabled.",
            other
        ),
    }

    match config.llm.provider.as_str() {
        "openai" | "ollama" | "disabled" => {}
        other => anyhow::bail!(
            "Unknown llm provider: '{}'. Must be openai, ollama, or disabled.",
            other
        ),
    }

    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }

    if config.auth.hash_iterations < 1 {
        anyhow::bail!("auth.hash_iterations must be >= 1");
    }

    if config.auth.token_ttl_minutes < 1 {
        anyhow::bail!("auth.token_ttl_minutes must be >= 1");
    }

    Ok(())
}
