//! OpenAI-compatible model client.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM and any endpoint exposing
//! `/chat/completions`. Each invocation is a single two-message exchange
//! (system + user), bounded by a hard timeout.

use async_trait::async_trait;
use jurisflow_core::error::ProviderError;
use jurisflow_core::model::{Generation, ModelClient};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Timeout applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);

/// Time allowed to establish a connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// An OpenAI-compatible chat-completions client.
pub struct OpenAiCompatClient {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    /// Create a new client for `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.4,
            max_tokens: None,
            timeout: DEFAULT_TIMEOUT,
            client,
        })
    }

    /// Create an OpenAI client (convenience constructor).
    pub fn openai(
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        Self::new("openai", "https://api.openai.com/v1", api_key, model)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the hard per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_body(&self, system_prompt: &str, user_message: &str) -> ApiRequest {
        ApiRequest {
            model: self.model.clone(),
            messages: vec![
                ApiMessage {
                    role: "system".into(),
                    content: Some(system_prompt.to_string()),
                },
                ApiMessage {
                    role: "user".into(),
                    content: Some(user_message.to_string()),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        }
    }

    /// Send the request and read the body. Runs under the caller's timeout.
    async fn exchange(&self, body: &ApiRequest) -> Result<(u16, String), ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;
        Ok((status, text))
    }

    /// Connect failures, including the connect timeout, are `Unreachable`.
    /// Only the call itself running out of time is a `Timeout`.
    fn transport_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_connect() {
            ProviderError::Unreachable(e.to_string())
        } else if e.is_timeout() {
            ProviderError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            ProviderError::Unreachable(e.to_string())
        }
    }
}

/// Pull the provider's own message out of an error body, if it has one.
fn provider_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .unwrap_or_else(|| body.trim().to_string())
}

/// Interpret a 2xx body. Anything without a non-empty first message is
/// "no content", not an error.
fn parse_generation(body: &str) -> Generation {
    let api_response: ApiResponse = match serde_json::from_str(body) {
        Ok(r) => r,
        Err(e) => return Generation::no_content(format!("unexpected response shape: {e}")),
    };

    let Some(choice) = api_response.choices.into_iter().next() else {
        return Generation::no_content("no choices in response");
    };

    match choice.message.and_then(|m| m.content) {
        Some(content) if !content.trim().is_empty() => Generation::text(content.trim()),
        _ => Generation::no_content("first choice has no text content"),
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<Generation, ProviderError> {
        let body = self.build_body(system_prompt, user_message);

        debug!(
            provider = %self.name,
            model = %self.model,
            message_len = user_message.len(),
            "Sending completion request"
        );

        let (status, text) = tokio::time::timeout(self.timeout, self.exchange(&body))
            .await
            .map_err(|_| ProviderError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            })??;

        if !(200..300).contains(&status) {
            let message = provider_message(&text);
            warn!(status, message = %message, "Provider returned error");
            return Err(ProviderError::Api {
                status_code: status,
                message,
            });
        }

        let generation = parse_generation(&text);
        if let Generation::NoContent { reason } = &generation {
            warn!(provider = %self.name, reason = %reason, "Provider produced no content");
        }
        Ok(generation)
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        Ok(response.status().is_success())
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    #[serde(default)]
    message: Option<ApiMessage>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
}
