//! Bounded retry with exponential backoff.
//!
//! Extracted so every external-collaborator call shares one policy instead of
//! ad hoc sleep loops. The caller decides the terminal fallback value; this
//! only bounds the attempts and spaces them out.

use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::{debug, warn};

/// Retry schedule for a fallible async operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay after the first failure; doubles after each subsequent failure.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Run `op` until it succeeds or attempts are exhausted, returning the
    /// last error in that case. No sleep after the final failure.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_err = anyhow!("{}: no attempts were made", label);

        for attempt in 1..=self.max_attempts.max(1) {
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", label, attempt);
                    }
                    return Ok(value);
                }
                Err(e) => {
                    warn!(
                        "{} failed (attempt {}/{}): {}",
                        label, attempt, self.max_attempts, e
                    );
                    last_err = e;
                }
            }

            if attempt < self.max_attempts {
                let delay = self.base_delay * 2u32.saturating_pow(attempt - 1);
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn returns_first_success_without_extra_attempts() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .run("op", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(42u32) }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = fast_policy(3)
            .run("op", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(anyhow!("transient"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_returns_last_error() {
        let result: Result<()> = fast_policy(2)
            .run("op", |attempt| async move {
                Err(anyhow!("failure {}", attempt))
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("failure 2"));
    }
}
