//! Bounded exponential backoff with jitter: retried only for
//! transient errors (timeouts, 5xx, 429); anything else propagates
//! immediately. Default 3 attempts.

use std::time::Duration;

use rand::Rng;

use bomenrich_core::{CoreError, ErrorKind};

#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub max_attempts: u32,
    pub base: Duration,
    pub max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self { max_attempts: 3, base: Duration::from_millis(500), max: Duration::from_secs(10) }
    }
}

impl BackoffConfig {
    /// Full-jitter backoff: a random duration in `[0, min(max, base * 2^attempt))`.
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.base.as_millis().saturating_mul(1u128 << attempt.min(20));
        let capped = exp.min(self.max.as_millis());
        let jittered = rand::thread_rng().gen_range(0..=capped.max(1));
        Duration::from_millis(jittered as u64)
    }
}

/// Runs `op` up to `config.max_attempts` times. Stops retrying as soon as
/// `op`'s error is non-retryable per `ErrorKind::is_retryable`.
pub async fn retry_with_backoff<T, F, Fut>(config: &BackoffConfig, mut op: F) -> Result<T, CoreError>
where
F: FnMut() -> Fut,
Fut: std::future::Future<Output = Result<T, CoreError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(err) => {
                attempt += 1;
                let retryable = err.kind().is_retryable() || err.kind() == ErrorKind::RateLimited;
                if !retryable || attempt >= config.max_attempts {
                    return Err(err);
                }
                let delay = config.delay_for_attempt(attempt);
                tracing::warn!(attempt, ?delay, error = %err, "retrying after transient failure");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn stops_after_max_attempts_on_transient_error() {
        let calls = AtomicU32::new(0);
        let config = BackoffConfig { max_attempts: 3, base: Duration::from_millis(1), max: Duration::from_millis(5) };

        let result: Result<(), CoreError> = retry_with_backoff(&config, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(CoreError::Transient("timeout".to_string())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_stops_immediately() {
        let calls = AtomicU32::new(0);
        let config = BackoffConfig::default();

        let result: Result<(), CoreError> = retry_with_backoff(&config, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(CoreError::Validation("bad mpn".to_string())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_on_a_later_attempt() {
        let calls = AtomicU32::new(0);
        let config = BackoffConfig { max_attempts: 5, base: Duration::from_millis(1), max: Duration::from_millis(5) };

        let result = retry_with_backoff(&config, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(CoreError::Transient("5xx".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, 42);
    }
}
