//! Retry with exponential backoff for calls to external model services.
//!
//! This is the only place in the crate where failures are retried. Every
//! other layer propagates errors unchanged.
//!
//! # Usage
//!
//! ```rust,ignore
//! use lumina::llm::retry::{with_retry, RetryPolicy};
//! use tokio_util::sync::CancellationToken;
//!
//! let policy = RetryPolicy::default();
//! let token = CancellationToken::new();
//! let vector = with_retry(&policy, &token, || backend.embed("hello")).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::config::RetryConfig;
use crate::errors::LuminaError;
use crate::errors::Result;

/// Configuration for retry behavior with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one (default: 5).
    pub max_retries: u32,
    /// Delay before the first retry (default: 1s).
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each retry (default: 2.0).
    pub backoff_factor: f64,
    /// Upper bound for a single delay (default: 60s).
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            initial_delay,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries.max(1),
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            backoff_factor: 2.0,
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// Delay after the failed attempt number `attempt` (0-indexed):
    /// `initial_delay * backoff_factor^attempt`, capped at `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.min(31) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        let capped = secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }
}

/// Outcome of a retried operation.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    /// The success value or the terminal error.
    pub result: Result<T>,
    /// Number of times the operation was invoked.
    pub attempts: u32,
    /// Sum of the backoff delays applied between attempts.
    pub total_delay: Duration,
}

/// Execute an async operation with retry and exponential backoff.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    with_retry_outcome(policy, cancel, operation).await.result
}

/// Execute an async operation with retry, returning detailed outcome.
///
/// Transient failures are retried after `delay_for_attempt(n)`; anything
/// else is returned at once. There is no delay after the final attempt.
/// Cancellation is observed before every attempt and during every delay.
pub async fn with_retry_outcome<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_retries = policy.max_retries.max(1);
    let mut attempt = 0u32;
    let mut total_delay = Duration::ZERO;

    loop {
        if cancel.is_cancelled() {
            return RetryOutcome {
                result: Err(LuminaError::Cancelled),
                attempts: attempt,
                total_delay,
            };
        }

        let err = match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("Operation succeeded after {} retries", attempt);
                }
                return RetryOutcome {
                    result: Ok(value),
                    attempts: attempt + 1,
                    total_delay,
                };
            }
            Err(err) => err,
        };
        attempt += 1;

        if !err.is_transient() {
            return RetryOutcome {
                result: Err(err),
                attempts: attempt,
                total_delay,
            };
        }

        if attempt >= max_retries {
            warn!("Giving up after {} attempts: {}", attempt, err);
            return RetryOutcome {
                result: Err(LuminaError::RetriesExhausted {
                    attempts: attempt,
                    last_error: Box::new(err),
                }),
                attempts: attempt,
                total_delay,
            };
        }

        let delay = policy.delay_for_attempt(attempt - 1);
        warn!(
            "[Retry {}/{}] Model service error: {}. Waiting {:?}...",
            attempt, max_retries, err, delay
        );

        tokio::select! {
            () = cancel.cancelled() => {
                return RetryOutcome {
                    result: Err(LuminaError::Cancelled),
                    attempts: attempt,
                    total_delay,
                };
            }
            () = tokio::time::sleep(delay) => {}
        }
        total_delay += delay;
    }
}
