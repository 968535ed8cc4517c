//! Retry and timeout helpers for provider and store calls

use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Fixed-delay retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries + 1
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy is exhausted
///
/// Returns the final result and the number of attempts made.
pub async fn with_retries<T, F, Fut>(policy: RetryPolicy, what: &str, mut op: F) -> (Result<T>, u32)
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return (Ok(value), attempt),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts() => {
                warn!(what, attempt, error = %e, "Attempt failed, retrying");
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    error!(what, attempts = attempt, error = %e, "Retries exhausted");
                }
                return (Err(e), attempt);
            }
        }
    }
}

/// Bound `fut` by `limit`; elapsed deadlines become [`Error::Timeout`]
pub async fn with_timeout<T, Fut>(limit: Duration, what: &str, fut: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(format!("{} exceeded {:?}", what, limit))),
    }
}
