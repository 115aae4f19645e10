//! Bounded retry with a per-attempt deadline.
//!
//! Every unary call goes through [`RetryTimeoutExecutor`]. Streaming sessions
//! share the same [`RetryBackoff`] policy for their reconnect delays.

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Policy producing the delay before a retry.
pub trait RetryBackoff: Debug + Send + Sync {
    /// Delay before retry number `attempt`, counting from 1.
    fn delay(&self, attempt: u32) -> Duration;
}

/// The same delay before every retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay(pub Duration);

impl RetryBackoff for FixedDelay {
    fn delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}

/// Delay doubling from `base` on every retry, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    pub base: Duration,
    pub max: Duration,
}

impl ExponentialBackoff {
    #[must_use]
    pub const fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }
}

impl RetryBackoff for ExponentialBackoff {
    fn delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << shift)
            .map_or(self.max, |d| d.min(self.max))
    }
}

/// Runs one call with a local deadline and retries transient failures.
#[derive(Debug, Clone)]
pub struct RetryTimeoutExecutor {
    max_retries: u32,
    request_timeout: Duration,
    backoff: Arc<dyn RetryBackoff>,
}

impl RetryTimeoutExecutor {
    #[must_use]
    pub fn new(
        max_retries: u32,
        request_timeout: Duration,
        backoff: Arc<dyn RetryBackoff>,
    ) -> Self {
        Self {
            max_retries,
            request_timeout,
            backoff,
        }
    }

    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            config.max_retries,
            config.request_timeout,
            Arc::clone(&config.retry_backoff),
        )
    }

    /// Same deadline, but a single attempt.
    #[must_use]
    pub fn without_retries(&self) -> Self {
        Self {
            max_retries: 0,
            ..self.clone()
        }
    }

    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Execute `call`, retrying retryable failures up to `max_retries` times.
    ///
    /// An attempt still running after `request_timeout` is abandoned and
    /// counts as a [`ClientError::LocalTimeout`].
    ///
    /// # Errors
    ///
    /// Returns the first non-retryable error, or the last error once retries
    /// are exhausted.
    pub async fn execute<T, F, Fut>(&self, op: &'static str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            let outcome = match tokio::time::timeout(self.request_timeout, call()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ClientError::LocalTimeout(self.request_timeout)),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.backoff.delay(attempt);
                    debug!(
                        op,
                        attempt,
                        max_retries = self.max_retries,
                        ?delay,
                        error = %err,
                        "retrying request"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    if attempt > 0 {
                        warn!(
                            op,
                            attempts = attempt + 1,
                            error = %err,
                            "request failed after retries"
                        );
                    }
                    return Err(err);
                }
            }
        }
    }
}
