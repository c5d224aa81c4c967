//! Retry configuration, delay calculation, and the retrying client decorator.
//!
//! [`RetryingClient`] wraps any [`CompletionClient`] and retries transient
//! errors through the shared `with_retry()` helper. Streaming calls are
//! retried only while the stream is being established: once a
//! [`FragmentStream`] has been handed out, mid-stream failures surface to the
//! consumer and are never replayed.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::traits::CompletionClient;
use crate::stream::FragmentStream;
use crate::telemetry;
use crate::types::GenerateOptions;
use crate::{PromptifyError, Result};

/// Configuration for retry behaviour on transient errors.
///
/// Exponential backoff from `initial_delay`, capped at `max_delay`:
///
/// ```rust
/// # use promptify::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(6)
///     .max_delay(Duration::from_secs(60));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: 6.
    pub max_attempts: u32,
    /// Base delay before the first retry. Default: 1s.
    pub initial_delay: Duration,
    /// Maximum delay between retries. Default: 60s.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Config from a model's wait interval and retry count.
    ///
    /// `api_retry` bounds the total number of attempts; `api_wait` caps
    /// the backoff between them.
    pub fn from_api_settings(api_wait: Duration, api_retry: u32) -> Self {
        Self::default()
            .max_attempts(api_retry.max(1))
            .max_delay(api_wait)
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Backoff for a given attempt number (0-indexed):
    /// `initial_delay * 2^attempt`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }

    /// Backoff respecting a provider `retry_after` hint, which takes
    /// precedence over the calculated delay.
    pub fn effective_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or_else(|| self.delay_for_attempt(attempt))
    }
}

/// Execute an async operation with retry logic.
///
/// Retries on transient errors (see [`PromptifyError::is_transient()`]) up
/// to `config.max_attempts`, sleeping between attempts. Permanent errors are
/// returned immediately.
pub(crate) async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    client_name: &str,
    operation: &str,
    f: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = None;
    for attempt in 0..config.max_attempts {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_transient() => {
                if attempt + 1 < config.max_attempts {
                    let delay = config.effective_delay(attempt, e.retry_after());
                    metrics::counter!(telemetry::RETRIES_TOTAL,
                        "client" => client_name.to_owned(),
                        "operation" => operation.to_owned(),
                    )
                    .increment(1);
                    warn!(
                        client = client_name,
                        operation,
                        attempt = attempt + 1,
                        max_attempts = config.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                }
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        PromptifyError::Configuration("retry configured with zero attempts".into())
    }))
}

/// Decorator that wraps a [`CompletionClient`] with retry logic.
pub struct RetryingClient {
    inner: Arc<dyn CompletionClient>,
    config: RetryConfig,
}

impl RetryingClient {
    pub fn new(inner: Arc<dyn CompletionClient>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

#[async_trait]
impl CompletionClient for RetryingClient {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String> {
        with_retry(&self.config, self.inner.name(), "generate", || {
            self.inner.generate(prompt, options)
        })
        .await
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<FragmentStream> {
        with_retry(&self.config, self.inner.name(), "generate_stream", || {
            self.inner.generate_stream(prompt, options)
        })
        .await
    }
}
