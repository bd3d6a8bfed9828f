//! Retry with linear backoff for transient model-call failures.
//!
//! Wraps any [`ModelClient`]. Timeouts and unreachable endpoints are retried
//! up to `max_attempts` times, sleeping `attempt × backoff_base` between
//! attempts. Errors the provider reported itself (4xx/5xx) are returned on
//! the first occurrence.

use async_trait::async_trait;
use jurisflow_core::error::ProviderError;
use jurisflow_core::model::{Generation, ModelClient};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// How many times to try, and how long to wait in between.
///
/// Waits happen only between attempts: three attempts at a 1 s base sleep
/// 1 s and then 2 s, and the last failure is returned without a further
/// sleep. `delay_after(max_attempts)` is never used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
        }
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_base * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// A client that retries transient failures of an inner client.
pub struct RetryingClient {
    name: String,
    inner: Arc<dyn ModelClient>,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(inner: Arc<dyn ModelClient>, policy: RetryPolicy) -> Self {
        Self {
            name: format!("retrying({})", inner.name()),
            inner,
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }
}

#[async_trait]
impl ModelClient for RetryingClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(
        &self,
        system_prompt: &str,
        user_message: &str,
    ) -> Result<Generation, ProviderError> {
        let mut attempt = 1;
        loop {
            match self.inner.invoke(system_prompt, user_message).await {
                Ok(generation) => {
                    if attempt > 1 {
                        info!(provider = %self.inner.name(), attempt, "Model call succeeded after retry");
                    }
                    return Ok(generation);
                }
                Err(e) if e.is_retryable() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        provider = %self.inner.name(),
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Model call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(provider = %self.inner.name(), attempt, error = %e, "Model call failed");
                    return Err(e);
                }
            }
        }
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}
