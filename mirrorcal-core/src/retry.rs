//! Retry with backoff for provider calls.
//!
//! The policy is an explicit parameter at the adapter boundary, not hidden
//! global state. Only errors the taxonomy marks retryable (rate limits,
//! transients, timeouts) are retried in-pass; everything else surfaces
//! immediately. Whatever still fails after the last attempt is left to the
//! next scheduled pass, where the correlation id makes the redo idempotent.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::error::MirrorResult;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles each retry after that.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    fn delay_before(&self, attempt: u32) -> Duration {
        // attempt is 1-based; first retry waits base_delay
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Run `op` until it succeeds, fails non-retryably, or the policy is
/// exhausted.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> MirrorResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = MirrorResult<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.delay_before(attempt);
                debug!(attempt, error = %e, delay_ms = delay.as_millis() as u64, "retrying provider call");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MirrorError, ProviderErrorKind};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient() -> MirrorError {
        MirrorError::provider(ProviderErrorKind::Transient, "flaky")
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
        };

        let result = with_retry(&policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(transient())
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::ZERO,
        };

        let result: MirrorResult<()> = with_retry(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(MirrorError::provider(ProviderErrorKind::Unauthorized, "revoked")) }
        })
        .await;

        assert!(result.unwrap_err().is_unauthorized());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_policy_exhaustion_returns_last_error() {
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::ZERO,
        };

        let result: MirrorResult<()> = with_retry(&policy, || async { Err(transient()) }).await;
        assert!(result.unwrap_err().is_retryable());
    }
}
