//! Build the model client stack from configuration.

use std::sync::Arc;
use std::time::Duration;

use jurisflow_config::AppConfig;
use jurisflow_core::error::ProviderError;
use jurisflow_core::model::ModelClient;

use crate::openai_compat::OpenAiCompatClient;
use crate::retry::{RetryPolicy, RetryingClient};

/// Infer a short provider name from the endpoint URL, for logs.
fn provider_name(api_url: &str) -> &'static str {
    if api_url.contains("openrouter.ai") {
        "openrouter"
    } else if api_url.contains("api.openai.com") {
        "openai"
    } else if api_url.contains("localhost:11434") {
        "ollama"
    } else {
        "openai-compatible"
    }
}

/// The retry policy described by `[pipeline]`.
pub fn retry_policy(config: &AppConfig) -> RetryPolicy {
    RetryPolicy::new(
        config.pipeline.max_attempts,
        Duration::from_millis(config.pipeline.backoff_base_ms),
    )
}

/// Build the configured client: an OpenAI-compatible client with the
/// configured timeout, wrapped in the retry policy.
///
/// Fails with `NotConfigured` when no API key is available.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn ModelClient>, ProviderError> {
    let api_key = config
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            ProviderError::NotConfigured(
                "no API key: set api_key in config.toml or JURISFLOW_API_KEY".into(),
            )
        })?;

    let client = OpenAiCompatClient::new(
        provider_name(&config.api_url),
        &config.api_url,
        api_key,
        &config.model,
    )?
    .with_temperature(config.temperature)
    .with_max_tokens(config.max_tokens)
    .with_timeout(Duration::from_secs(config.pipeline.timeout_secs));

    Ok(Arc::new(RetryingClient::new(
        Arc::new(client),
        retry_policy(config),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names() {
        assert_eq!(provider_name("https://openrouter.ai/api/v1"), "openrouter");
        assert_eq!(provider_name("https://api.openai.com/v1"), "openai");
        assert_eq!(provider_name("http://localhost:11434/v1"), "ollama");
        assert_eq!(provider_name("http://vllm.internal/v1"), "openai-compatible");
    }

    #[test]
    fn missing_key_is_not_configured() {
        let config = AppConfig::default();
        assert!(matches!(
            build_from_config(&config),
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[test]
    fn builds_retrying_client() {
        let config = AppConfig {
            api_key: Some("sk-test".into()),
            ..AppConfig::default()
        };
        let client = build_from_config(&config).unwrap();
        assert_eq!(client.name(), "retrying(openai)");
    }

    #[test]
    fn policy_follows_config() {
        let mut config = AppConfig::default();
        config.pipeline.max_attempts = 5;
        config.pipeline.backoff_base_ms = 250;
        let policy = retry_policy(&config);
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay_after(2), Duration::from_millis(500));
    }
}
