//! Model client trait: the abstraction over the language-model endpoint.
//!
//! A client sends one (system prompt, user message) exchange and returns
//! the generated text. It does not retry; retry policy belongs to callers
//! (see `jurisflow_providers::RetryingClient`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// What a successful round-trip to the provider produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Generation {
    /// Generated text, trimmed of surrounding whitespace.
    Text { text: String },
    /// The provider answered 2xx but without a usable message: empty choice
    /// list, missing content, or an unexpected body shape.
    NoContent { reason: String },
}

impl Generation {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn no_content(reason: impl Into<String>) -> Self {
        Self::NoContent {
            reason: reason.into(),
        }
    }

    /// The generated text, if any was produced.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::NoContent { .. } => None,
        }
    }
}

/// The core model client trait.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// A human-readable name (e.g. "openai", "retrying(openai)").
    fn name(&self) -> &str;

    /// Send a system-role message and a user-role message, get the reply.
    async fn invoke(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> std::result::Result<Generation, ProviderError>;

    /// Can we reach the provider at all?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}
