//! Exponential backoff retry driver.

use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Backoff policy: up to `max_retries` retries after the first attempt
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    /// Base wait; retry `k` waits `base_interval * 2^k`
    pub base_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_interval: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Create a new policy
    pub fn new(max_retries: u32, base_interval: Duration) -> Self {
        Self {
            max_retries,
            base_interval,
        }
    }

    /// Wait before retry `retry` (1-based). No jitter, no cap.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_interval.saturating_mul(factor)
    }

    /// Total number of attempts this policy allows
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Permanent failure reported once every attempt has failed
#[derive(Error, Debug)]
#[error("max retries exceeded after {attempts} attempts: {last}")]
pub struct RetriesExhausted<E> {
    /// Attempts made, including the first
    pub attempts: u32,
    /// Error from the final attempt
    pub last: E,
}

/// Run `action` until it succeeds or the policy is exhausted.
///
/// Attempts run one after another; the scheduler sleeps between them and
/// returns the first success.
pub async fn retry_with_backoff<F, Fut, T, E>(
    policy: &RetryPolicy,
    mut action: F,
) -> Result<T, RetriesExhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut retry_count = 0u32;

    loop {
        match action().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                retry_count += 1;
                if retry_count > policy.max_retries {
                    warn!("Giving up after {} attempts: {}", retry_count, e);
                    return Err(RetriesExhausted {
                        attempts: retry_count,
                        last: e,
                    });
                }

                let delay = policy.delay_for(retry_count);
                info!("Retry {} after {:?} ({})", retry_count, delay, e);
                tokio::time::sleep(delay).await;
            }
        }
    }
}
