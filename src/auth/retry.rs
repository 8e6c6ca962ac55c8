use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::app::{NotifierError, Result};

/// Bounded exponential backoff for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first (default: 5)
    pub max_attempts: u32,
    /// Delay after the first failure in milliseconds (default: 1000)
    pub base_delay_ms: u64,
    /// Upper bound for any single delay in milliseconds (default: 30000)
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Policy used around timeline requests.
    pub fn acquisition() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2_000,
            ..Default::default()
        }
    }

    /// Delay after failed attempt `attempt` (1-based):
    /// `min(base * 2^(attempt-1), cap)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let delay = self
            .base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_ms);
        Duration::from_millis(delay)
    }

    /// Sum of the delays slept when every attempt fails.
    pub fn total_backoff(&self) -> Duration {
        (1..self.max_attempts.max(1)).map(|a| self.delay(a)).sum()
    }

    /// Run `op`, retrying while it fails with a transient error.
    ///
    /// Non-transient errors are returned immediately. A transient error on
    /// the last attempt becomes [`NotifierError::RetriesExhausted`].
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.delay(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    return Err(NotifierError::RetriesExhausted {
                        operation: operation.to_string(),
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::time::Instant;
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    fn unavailable() -> NotifierError {
        NotifierError::Status {
            status: 503,
            url: "https://api.x.com/1.1/onboarding/task.json".into(),
            body: "Service Unavailable".into(),
        }
    }

    #[test]
    fn test_delay_series_is_capped() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=7).map(|a| policy.delay(a).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);
    }

    #[test]
    fn test_total_backoff() {
        assert_eq!(RetryPolicy::default().total_backoff(), Duration::from_secs(15));
        assert_eq!(RetryPolicy::acquisition().total_backoff(), Duration::from_secs(6));
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        assert_eq!(RetryPolicy::default().delay(200), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_transient_exhausts_attempts() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<()> = policy
            .run("login", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(unavailable()) }
            })
            .await;

        let err = assert_err!(result);
        assert!(!err.is_transient());
        match err {
            NotifierError::RetriesExhausted { attempts, last, .. } => {
                assert_eq!(attempts, 5);
                assert!(last.is_transient());
            }
            other => panic!("expected exhausted retries, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(start.elapsed(), Duration::from_secs(1 + 2 + 4 + 8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<()> = RetryPolicy::default()
            .run("login", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(NotifierError::Auth("wrong password".into())) }
            })
            .await;

        assert_err!(result);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let result = RetryPolicy::default()
            .run("login", |attempt| async move {
                if attempt < 3 {
                    Err(unavailable())
                } else {
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(assert_ok!(result), 3);
    }
}
