//! Chat-completion providers.
//!
//! A [`ChatModel`] turns a composed [`Prompt`] into answer text. Providers
//! are selected by `[llm].provider`: `openai`, `ollama`, or `disabled`.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use scuba_rag_core::prompt::Prompt;

use crate::config::LlmConfig;
use crate::retry::{self, HttpError, JsonEndpoint};

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("language model is disabled")]
    Disabled,

    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    #[error("completion request failed: {0}")]
    Request(String),

    #[error("malformed completion response: {0}")]
    Malformed(String),
}

impl From<HttpError> for LlmError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Decode { reason, .. } => LlmError::Malformed(reason),
            other => LlmError::Request(other.to_string()),
        }
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Generate the assistant's reply for `prompt`.
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError>;
}

pub fn create_chat_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIChat::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaChat::new(config)?)),
        "disabled" => Ok(Arc::new(DisabledChat)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

fn chat_messages(prompt: &Prompt) -> serde_json::Value {
    serde_json::json!([
        { "role": "system", "content": prompt.system_message() },
        { "role": "user", "content": prompt.user_message() },
    ])
}

pub struct DisabledChat;

#[async_trait]
impl ChatModel for DisabledChat {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn complete(&self, _prompt: &Prompt) -> Result<String, LlmError> {
        Err(LlmError::Disabled)
    }
}

/// OpenAI chat completions. Reads `OPENAI_API_KEY` on every call.
pub struct OpenAIChat {
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            client: retry::client(config.timeout_secs)?,
        })
    }

    fn request_body(&self, prompt: &Prompt) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": chat_messages(prompt),
            "temperature": self.temperature,
        });
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        body
    }
}

#[async_trait]
impl ChatModel for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| LlmError::MissingCredentials("OPENAI_API_KEY not set".into()))?;

        let endpoint = JsonEndpoint {
            service: "OpenAI",
            url: OPENAI_CHAT_URL.to_string(),
            bearer: Some(api_key),
            max_retries: self.max_retries,
        };

        let json = retry::post_json(&self.client, &endpoint, &self.request_body(prompt)).await?;
        parse_openai_completion(&json)
    }
}

fn parse_openai_completion(json: &serde_json::Value) -> Result<String, LlmError> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(|c| c.to_string())
        .ok_or_else(|| LlmError::Malformed("missing choices[0].message.content".into()))
}

/// Chat against a local Ollama instance via `/api/chat`.
pub struct OllamaChat {
    model: String,
    temperature: f32,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            max_retries: config.max_retries,
            client: retry::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let endpoint = JsonEndpoint {
            service: "Ollama",
            url: format!("{}/api/chat", self.url.trim_end_matches('/')),
            bearer: None,
            max_retries: self.max_retries,
        };
        let body = serde_json::json!({
            "model": self.model,
            "messages": chat_messages(prompt),
            "stream": false,
            "options": { "temperature": self.temperature },
        });

        let json = retry::post_json(&self.client, &endpoint, &body).await?;
        json.pointer("/message/content")
            .and_then(|c| c.as_str())
            .map(|c| c.to_string())
            .ok_or_else(|| LlmError::Malformed("missing message.content".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scuba_rag_core::models::Chunk;

    fn prompt() -> Prompt {
        let chunks = vec![Chunk {
            source: "malpelo.yaml".into(),
            index: 0,
            start: 0,
            text: "Malpelo: tiburones martillo".into(),
        }];
        Prompt::compose(&chunks, "¿Dónde veo tiburones?")
    }

    #[test]
    fn test_openai_request_body() {
        let mut config = LlmConfig::default();
        config.max_tokens = Some(256);
        let chat = OpenAIChat::new(&config).unwrap();
        let body = chat.request_body(&prompt());

        assert_eq!(body["model"], "gpt-4.1");
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["messages"][0]["role"], "system");
        let user = body["messages"][1]["content"].as_str().unwrap();
        assert!(user.contains("tiburones martillo"));
        assert!(user.contains("¿Dónde veo tiburones?"));
    }

    #[test]
    fn test_openai_request_body_omits_unset_max_tokens() {
        let chat = OpenAIChat::new(&LlmConfig::default()).unwrap();
        assert!(chat.request_body(&prompt()).get("max_tokens").is_none());
    }

    #[test]
    fn test_parse_openai_completion() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "Malpelo." } }]
        });
        assert_eq!(parse_openai_completion(&json).unwrap(), "Malpelo.");

        let err = parse_openai_completion(&serde_json::json!({ "choices": [] })).unwrap_err();
        assert!(matches!(err, LlmError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_disabled_chat_errors() {
        let err = DisabledChat.complete(&prompt()).await.unwrap_err();
        assert!(matches!(err, LlmError::Disabled));
    }

    #[test]
    fn test_create_chat_model() {
        let mut config = LlmConfig::default();
        assert_eq!(create_chat_model(&config).unwrap().model_name(), "gpt-4.1");
        config.provider = "disabled".into();
        assert_eq!(create_chat_model(&config).unwrap().model_name(), "disabled");
        config.provider = "nope".into();
        assert!(create_chat_model(&config).is_err());
    }
}
