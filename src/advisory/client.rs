//! Chat-completion client for the advisory endpoint.

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::config::AdvisorConfig;

use super::AdvisoryError;

/// Sampling temperature for every advisory request
const TEMPERATURE: f64 = 0.7;

/// Completion token ceiling
const MAX_TOKENS: u32 = 1_000;

/// OpenRouter credentials carry this prefix
const API_KEY_PREFIX: &str = "sk-or-v1-";

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// Client for the external advisory LLM.
///
/// Each query is a single awaited request: no retries, no streaming, no
/// conversation state.
#[derive(Debug, Clone)]
pub struct AdvisoryClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl AdvisoryClient {
    /// Build a client from configuration, validating the credential up
    /// front so a missing key fails at startup rather than per request.
    pub fn new(config: &AdvisorConfig) -> Result<Self, AdvisoryError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            AdvisoryError::InvalidCredential(
                "OpenRouter API key not found in environment variables".to_string(),
            )
        })?;

        if !api_key.starts_with(API_KEY_PREFIX) {
            return Err(AdvisoryError::InvalidCredential(format!(
                "OpenRouter API keys should start with '{API_KEY_PREFIX}'"
            )));
        }

        let http = Client::builder()
            .user_agent(concat!("rooftop-analyzer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AdvisoryError::Api(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    /// Send one prompt and return the raw completion text.
    pub async fn query(&self, prompt: &str) -> Result<String, AdvisoryError> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
        });

        info!(model = %self.model, prompt_len = prompt.len(), "Querying advisory endpoint");

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AdvisoryError::Api(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AdvisoryError::Api(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_failure(status, &text));
        }

        let completion: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|e| AdvisoryError::Api(format!("Unexpected response body: {e}")))?;

        let content = completion
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(AdvisoryError::Api("empty completion".to_string()));
        }

        debug!(response_len = content.len(), "Advisory response received");

        Ok(content)
    }
}

/// Map an unsuccessful response onto the user-facing error taxonomy.
fn classify_failure(status: StatusCode, body: &str) -> AdvisoryError {
    match status {
        StatusCode::UNAUTHORIZED => AdvisoryError::Auth,
        StatusCode::TOO_MANY_REQUESTS => AdvisoryError::RateLimited,
        _ if body.to_lowercase().contains("quota") => AdvisoryError::QuotaExceeded,
        _ => AdvisoryError::Api(format!("HTTP {status}: {body}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(api_key: Option<&str>) -> AdvisorConfig {
        AdvisorConfig {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "google/gemma-3-12b-it:free".to_string(),
            api_key: api_key.map(str::to_string),
        }
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let err = AdvisoryClient::new(&test_config(None)).unwrap_err();
        assert!(matches!(err, AdvisoryError::InvalidCredential(_)));
    }

    #[test]
    fn test_wrong_key_format_is_rejected() {
        let err = AdvisoryClient::new(&test_config(Some("sk-proj-123"))).unwrap_err();
        assert!(matches!(err, AdvisoryError::InvalidCredential(_)));
    }

    #[test]
    fn test_valid_key_accepted() {
        assert!(AdvisoryClient::new(&test_config(Some("sk-or-v1-abc"))).is_ok());
    }

    #[test]
    fn test_classify_auth_failure() {
        let err = classify_failure(StatusCode::UNAUTHORIZED, "nope");
        assert!(matches!(err, AdvisoryError::Auth));
    }

    #[test]
    fn test_classify_rate_limit() {
        let err = classify_failure(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, AdvisoryError::RateLimited));
    }

    #[test]
    fn test_classify_quota_exhaustion() {
        let err = classify_failure(
            StatusCode::PAYMENT_REQUIRED,
            "monthly quota exceeded for this key",
        );
        assert!(matches!(err, AdvisoryError::QuotaExceeded));
    }

    #[test]
    fn test_classify_generic_failure_keeps_message() {
        let err = classify_failure(StatusCode::INTERNAL_SERVER_ERROR, "upstream broke");
        match err {
            AdvisoryError::Api(msg) => assert!(msg.contains("upstream broke")),
            other => panic!("unexpected classification: {other:?}"),
        }
    }
}
