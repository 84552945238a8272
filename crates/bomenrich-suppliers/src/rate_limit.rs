//! Token-bucket rate limiter: sized to a supplier's per-minute
//! quota; a call blocks until a token is available or the caller-supplied
//! deadline expires. One reusable bucket per supplier.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use bomenrich_core::CoreError;

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// A single supplier's token bucket. `capacity` tokens refill continuously
/// at `capacity / 60s` per second, modeling a per-minute quota.
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn per_minute(quota_per_minute: u32) -> Self {
        let capacity = quota_per_minute as f64;
        Self {
            capacity,
            refill_per_sec: capacity / 60.0,
            state: Mutex::new(BucketState { tokens: capacity, last_refill: Instant::now() }),
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let elapsed = state.last_refill.elapsed().as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = Instant::now();
    }

    /// Blocks (yielding the async task, never the thread) until a token is
    /// available, or returns an error once `deadline` passes.
    pub async fn acquire(&self, deadline: Instant) -> Result<(), CoreError> {
        loop {
            {
                let mut state = self.state.lock().unwrap();
                self.refill(&mut state);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return Ok(());
                }
            }

            if Instant::now() >= deadline {
                return Err(CoreError::RateLimited);
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drains_and_refills_over_time() {
        let bucket = TokenBucket::per_minute(60); // 1 token/sec
        let deadline = Instant::now() + Duration::from_millis(50);
        bucket.acquire(deadline).await.unwrap();
        // Bucket starts full (60 tokens), so a second immediate call succeeds too.
        bucket.acquire(deadline).await.unwrap();
    }

    #[tokio::test]
    async fn exhausted_bucket_fails_fast_after_deadline() {
        let bucket = TokenBucket::per_minute(1);
        // Drain the single token.
        bucket.acquire(Instant::now() + Duration::from_millis(10)).await.unwrap();
        let err = bucket
            .acquire(Instant::now() + Duration::from_millis(20))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), bomenrich_core::ErrorKind::RateLimited);
    }
}
