//! JSON POST with exponential backoff, shared by the embedding and LLM
//! providers.
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("{service} API error {status}: {body}")]
    Status {
        service: String,
        status: u16,
        body: String,
    },

    #[error("{service} connection error: {reason}")]
    Network { service: String, reason: String },

    #[error("{service} response was not valid JSON: {reason}")]
    Decode { service: String, reason: String },
}

/// A JSON endpoint plus the retry budget to use against it.
pub struct JsonEndpoint<'a> {
    pub service: &'a str,
    pub url: String,
    pub bearer: Option<String>,
    pub max_retries: u32,
}

/// Build a client with the given request timeout.
pub fn client(timeout_secs: u64) -> Result<reqwest::Client, HttpError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| HttpError::Network {
            service: "http".into(),
            reason: e.to_string(),
        })
}

/// Backoff before retry `attempt` (1-based).
pub fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt.saturating_sub(1)).min(5))
}

pub async fn post_json(
    client: &reqwest::Client,
    endpoint: &JsonEndpoint<'_>,
    body: &serde_json::Value,
) -> Result<serde_json::Value, HttpError> {
    let mut last_err = None;

    for attempt in 0..=endpoint.max_retries {
        if attempt > 0 {
            tokio::time::sleep(backoff(attempt)).await;
        }

        let mut request = client
            .post(&endpoint.url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(key) = &endpoint.bearer {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json::<serde_json::Value>()
                        .await
                        .map_err(|e| HttpError::Decode {
                            service: endpoint.service.to_string(),
                            reason: e.to_string(),
                        });
                }

                let body_text = response.text().await.unwrap_or_default();
                let err = HttpError::Status {
                    service: endpoint.service.to_string(),
                    status: status.as_u16(),
                    body: body_text,
                };

                // Rate limited or server error, retry
                if status.as_u16() == 429 || status.is_server_error() {
                    tracing::warn!(service = endpoint.service, attempt, %status, "retryable API error");
                    last_err = Some(err);
                    continue;
                }

                return Err(err);
            }
            Err(e) => {
                tracing::warn!(service = endpoint.service, attempt, error = %e, "request failed");
                last_err = Some(HttpError::Network {
                    service: endpoint.service.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    Err(last_err.unwrap_or_else(|| HttpError::Network {
        service: endpoint.service.to_string(),
        reason: "request failed after retries".into(),
    }))
}
