//! Execution controls for collaborator calls: per-call timeout and bounded
//! retry with exponential backoff.
//!
//! Only the two fetches with no graceful degradation (initial candidates and
//! initial baseline) go through [`retry_fetch`]. Every other call gets a
//! deadline via [`with_timeout`] and fails once.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{FetchError, FetchResult};

/// Timeout and retry knobs for collaborator calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts for retried calls (1 = no retries).
    pub max_attempts: u32,
    /// Maximum wall-clock time for a single attempt (milliseconds).
    pub timeout_ms: u64,
    /// Base delay for exponential backoff between attempts (milliseconds).
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout_ms: 30_000,
            backoff_base_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }
}

/// Run one attempt of `fut` under a deadline.
pub async fn with_timeout<T, Fut>(timeout_ms: u64, operation: &str, fut: Fut) -> FetchResult<T>
where
    Fut: Future<Output = FetchResult<T>>,
{
    match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
        Ok(result) => result,
        Err(_elapsed) => Err(FetchError::timeout(operation, timeout_ms)),
    }
}

/// Run `f` until it succeeds, fails with a non-transient error, or runs out
/// of attempts. Returns the last error.
pub async fn retry_fetch<T, F, Fut>(policy: &RetryPolicy, operation: &str, f: F) -> FetchResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = FetchResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match with_timeout(policy.timeout_ms, operation, f()).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts && err.kind.is_transient() => {
                let delay = policy.backoff(attempt);
                warn!(
                    operation = %operation,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "fetch failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            timeout_ms: 1_000,
            backoff_base_ms: 100,
        }
    }

    #[test]
    fn test_retry_policy_default() {
        let cfg = RetryPolicy::default();
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.timeout_ms, 30_000);
        assert_eq!(cfg.backoff_base_ms, 500);
    }

    #[test]
    fn test_backoff_doubles() {
        let cfg = policy(5);
        assert_eq!(cfg.backoff(1), Duration::from_millis(100));
        assert_eq!(cfg.backoff(2), Duration::from_millis(200));
        assert_eq!(cfg.backoff(3), Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_then_succeeds() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let started = tokio::time::Instant::now();
        let result = retry_fetch(&policy(3), "list builds", move || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::Relaxed) < 2 {
                    Err(FetchError::new(FetchErrorKind::Transport, "reset"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::Relaxed), 3);
        // 100ms + 200ms of backoff
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_attempts_and_returns_last_error() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result: FetchResult<()> = retry_fetch(&policy(2), "list builds", move || {
            let c = c.clone();
            async move {
                let n = c.fetch_add(1, Ordering::Relaxed);
                Err(FetchError::new(FetchErrorKind::HttpStatus, format!("503 #{}", n)))
            }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(counter.load(Ordering::Relaxed), 2);
        assert_eq!(err.message, "503 #1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_does_not_retry_not_found() {
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result: FetchResult<()> = retry_fetch(&policy(5), "baseline", move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::Relaxed);
                Err(FetchError::not_found("no release"))
            }
        })
        .await;

        assert_eq!(result.unwrap_err().kind, FetchErrorKind::NotFound);
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_retried_then_reported() {
        let result: FetchResult<()> = retry_fetch(&policy(2), "baseline", || async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::Timeout);
        assert!(err.message.contains("baseline timed out after 1000ms"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_passes_through_result() {
        let ok = with_timeout(50, "compare", async { Ok::<_, FetchError>(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let slow: FetchResult<u8> = with_timeout(50, "compare", async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(1)
        })
        .await;
        assert_eq!(slow.unwrap_err().kind, FetchErrorKind::Timeout);
    }
}
