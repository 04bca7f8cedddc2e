//! Bounded-attempt retry with a pluggable backoff strategy.
//!
//! Retry is an explicit loop, not exception-driven control flow: the
//! orchestrator decides per error whether another attempt is worthwhile
//! via [`AppError::is_retryable`]. Cancellation is honored between
//! attempts and during backoff waits, never mid-flight — an in-flight
//! call is always allowed to finish and be recorded.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::AppError;

/// Delay schedule between retry attempts.
pub trait Backoff: Send + Sync {
    /// Delay to wait after the given failed attempt (1-indexed).
    fn delay_for_attempt(&self, attempt: u32) -> Duration;
}

/// Exponential backoff: `base * 2^(attempt-1)`, capped.
///
/// Default schedule: 1s, 2s, 4s, ... capped at 30s.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub base: Duration,
    pub max: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max: Duration::from_secs(30),
        }
    }
}

impl Backoff for ExponentialBackoff {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.base.saturating_mul(1u32 << exponent);
        std::cmp::min(delay, self.max)
    }
}

/// Fixed ceiling on attempts per operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Run `op` up to `policy.max_attempts` times, sleeping per `backoff`
/// between transient failures.
///
/// Non-retryable and fatal errors return immediately. Cancellation during
/// a backoff wait (or before the first attempt) returns
/// [`AppError::Cancelled`] without issuing another call.
pub async fn with_retries<T, F, Fut>(
    policy: &RetryPolicy,
    backoff: &dyn Backoff,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, AppError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && !e.is_fatal() && attempt < max_attempts => {
                let delay = backoff.delay_for_attempt(attempt);
                tracing::warn!(
                    %attempt,
                    delay_ms = %delay.as_millis(),
                    error = %e,
                    "Transient error, backing off before retry"
                );
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = cancel.cancelled() => return Err(AppError::Cancelled),
                }
            }
            Err(e) => return Err(e),
        }
    }

    unreachable!("retry loop always returns within max_attempts")
}
