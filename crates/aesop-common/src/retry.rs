//! Generic exponential-backoff retry helper shared by the LLM client and the
//! Critic's grading loop.
//!
//! Policy: base delay 1s, factor 2, jitter +/-20%, capped at `max_attempts` tries.
//! Only errors for which `is_retryable` returns true are retried; anything else
//! (or the final exhausted attempt) is returned to the caller.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub factor: f64,
    pub jitter: f64,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    /// base 1s, factor 2, jitter +/-20%, max 5 attempts.
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            factor: 2.0,
            jitter: 0.20,
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64 * self.factor.powi(attempt as i32 - 1);
        let jitter_span = base_ms * self.jitter;
        let jittered = rand::thread_rng().gen_range((base_ms - jitter_span)..=(base_ms + jitter_span));
        Duration::from_millis(jittered.max(0.0) as u64)
    }
}

/// Runs `op` up to `policy.max_attempts` times, sleeping with exponential
/// backoff + jitter between attempts, as long as `is_retryable(&err)` is true.
/// Returns the last error once attempts are exhausted or a non-retryable error
/// is hit.
pub async fn with_retry<T, E, F, Fut>(
    policy: RetryPolicy,
    mut is_retryable: impl FnMut(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < policy.max_attempts && is_retryable(&e) => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(attempt, ?delay, "retrying after transient error");
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
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_retry(
            RetryPolicy {
                base_delay: Duration::from_millis(1),
                ..Default::default()
            },
            |_: &&str| true,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("transient")
                    } else {
                        Ok(42)
                    }
                }
            },
        )
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_on_non_retryable() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_retry(
            RetryPolicy {
                base_delay: Duration::from_millis(1),
                ..Default::default()
            },
            |_: &&str| false,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err("fatal") }
            },
        )
        .await;
        assert_eq!(result, Err("fatal"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_retry(
            RetryPolicy {
                base_delay: Duration::from_millis(1),
                max_attempts: 3,
                ..Default::default()
            },
            |_: &&str| true,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err("still failing") }
            },
        )
        .await;
        assert_eq!(result, Err("still failing"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
