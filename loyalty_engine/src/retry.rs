//! Retry policy for storage operations.
//!
//! A single [`RetryPolicy`] describes how many times an operation may be attempted and how long to wait between
//! attempts. [`retry_with_policy`] runs an async operation under a policy. Only errors that the caller classifies as
//! retryable are retried. Anything else is handed straight back as [`RetryError::Aborted`].
//!
//! The operation closure is invoked afresh for every attempt, so when the operation is a database transaction, each
//! retry begins a brand new transaction.
use std::{
    fmt::{Debug, Display},
    future::Future,
    time::Duration,
};

use log::*;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Wait the same amount of time between every attempt
    Fixed(Duration),
    /// Wait `initial * multiplier^(n-1)` after the n-th consecutive failure, capped at `max`
    Exponential { initial: Duration, max: Duration, multiplier: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one. A value of 1 disables retries.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    /// Three attempts, half a second apart.
    fn default() -> Self {
        Self { max_attempts: 3, backoff: Backoff::Fixed(Duration::from_millis(500)) }
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, backoff: Backoff::Fixed(delay) }
    }

    pub fn exponential(max_attempts: u32, initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self { max_attempts, backoff: Backoff::Exponential { initial, max, multiplier } }
    }

    /// The delay before the next attempt, after `failures` attempts have failed.
    pub fn delay_after(&self, failures: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { initial, max, multiplier } => {
                let exponent = i32::try_from(failures.saturating_sub(1)).unwrap_or(i32::MAX);
                let delay_ms = initial.as_millis() as f64 * multiplier.powi(exponent);
                let capped_ms = delay_ms.min(max.as_millis() as f64);
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let capped_ms = capped_ms as u64;
                Duration::from_millis(capped_ms)
            },
        }
    }

    /// Whether another attempt is allowed after `failures` attempts have failed.
    pub fn should_retry(&self, failures: u32) -> bool {
        failures < self.max_attempts
    }
}

#[derive(Debug, Clone, Error)]
pub enum RetryError<E: Debug + Display> {
    #[error("{0}")]
    Aborted(E),
    #[error("Gave up after {attempts} attempts. Last error: {last}")]
    Exhausted { attempts: u32, last: E },
}

/// Runs `operation` until it succeeds, fails with an error that `is_retryable` rejects, or the policy's attempt budget
/// is spent.
pub async fn retry_with_policy<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    is_retryable: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Debug + Display,
{
    let mut failures = 0u32;
    loop {
        match operation().await {
            Ok(value) => {
                if failures > 0 {
                    info!("🔁️ {operation_name} succeeded after {failures} failed attempt(s)");
                }
                return Ok(value);
            },
            Err(e) if !is_retryable(&e) => {
                debug!("🔁️ {operation_name} failed with a non-retryable error: {e}");
                return Err(RetryError::Aborted(e));
            },
            Err(e) => {
                failures += 1;
                if !policy.should_retry(failures) {
                    error!("🔁️ {operation_name} failed {failures} times. Giving up. Last error: {e}");
                    return Err(RetryError::Exhausted { attempts: failures, last: e });
                }
                let delay = policy.delay_after(failures);
                warn!(
                    "🔁️ {operation_name} failed (attempt {failures} of {}): {e}. Retrying in {}ms",
                    policy.max_attempts,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            },
        }
    }
}
