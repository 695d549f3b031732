//! Model Client
//!
//! Sends one prompt to the text-generation endpoint and returns its text.
//! - The transport sits behind [`ModelBackend`] so tests can script it
//! - Transient failures are retried with exponential backoff ([`RetryPolicy`])
//! - Each attempt holds one slot of the shared [`ConcurrencyLimiter`]; the
//!   slot is released while backing off so waiting calls don't starve others

use super::http_client::ChatCompletionsBackend;
use super::limiter::ConcurrencyLimiter;
use super::retry::{RetryPolicy, RetryStep};
use crate::config::PipelineConfig;
use crate::error::ModelError;
use async_trait::async_trait;
use std::sync::Arc;

/// A prompt plus the sampling settings it should be sent with
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub text: String,
    pub temperature: f32,
}

impl Prompt {
    pub fn new(text: impl Into<String>, temperature: f32) -> Self {
        Self {
            text: text.into(),
            temperature,
        }
    }
}

/// One request/response exchange with a text-generation endpoint
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Make a single attempt. Must classify failures as `Transient` or `Fatal`.
    async fn generate(&self, prompt: &Prompt) -> Result<String, ModelError>;
}

/// Retrying, rate-bounded client; cheap to clone and share
#[derive(Clone)]
pub struct ModelClient {
    backend: Arc<dyn ModelBackend>,
    policy: RetryPolicy,
    limiter: ConcurrencyLimiter,
}

impl ModelClient {
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        policy: RetryPolicy,
        limiter: ConcurrencyLimiter,
    ) -> Self {
        Self {
            backend,
            policy,
            limiter,
        }
    }

    /// HTTP chat-completions client with policy and limiter taken from config
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ModelError> {
        let backend = ChatCompletionsBackend::from_config(config)?;
        Ok(Self::new(
            Arc::new(backend),
            RetryPolicy::from_config(config),
            ConcurrencyLimiter::new(config.max_concurrency),
        ))
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Send `prompt`, retrying transient failures per the policy
    pub async fn invoke(&self, prompt: &Prompt) -> Result<String, ModelError> {
        let mut attempt = 1;
        loop {
            let outcome = {
                let _permit = self.limiter.acquire().await;
                self.backend.generate(prompt).await
            };

            match self.policy.step(attempt, outcome) {
                RetryStep::Done(text) => {
                    if attempt > 1 {
                        tracing::debug!("[ModelClient] Succeeded on attempt {}", attempt);
                    }
                    return Ok(text);
                }
                RetryStep::Retry {
                    next_attempt,
                    delay,
                    error,
                } => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "[ModelClient] {} - retrying",
                        error
                    );
                    tokio::time::sleep(delay).await;
                    attempt = next_attempt;
                }
                RetryStep::GiveUp(error) => {
                    tracing::warn!(attempt, "[ModelClient] Giving up: {}", error);
                    return Err(error);
                }
            }
        }
    }
}
