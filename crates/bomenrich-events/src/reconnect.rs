//! Reconnection backoff: on transport or downstream disconnect, consumers
//! re-establish with exponential backoff (1 s → 60 s) and resume from the
//! last acknowledged offset.

use std::time::Duration;

const MIN_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Doubles on each call, capped at `MAX_BACKOFF`; resets after a clean
/// reconnect via [`ReconnectBackoff::reset`].
pub struct ReconnectBackoff {
    current: Duration,
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self { current: MIN_BACKOFF }
    }
}

impl ReconnectBackoff {
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(MAX_BACKOFF);
        delay
    }

    pub fn reset(&mut self) {
        self.current = MIN_BACKOFF;
    }
}

/// Runs `connect_and_consume` forever, resuming from `last_offset` and
/// backing off between attempts. `connect_and_consume` returns the last
/// offset it successfully committed before failing, so the next attempt
/// resumes there rather than from the start of the stream.
pub async fn run_with_retry<F, Fut>(mut last_offset: Option<u64>, mut connect_and_consume: F)
where
F: FnMut(Option<u64>) -> Fut,
Fut: std::future::Future<Output = Result<Option<u64>, bomenrich_core::CoreError>>,
{
    let mut backoff = ReconnectBackoff::default();
    loop {
        match connect_and_consume(last_offset).await {
            Ok(committed) => {
                last_offset = committed.or(last_offset);
                backoff.reset();
            }
            Err(err) => {
                let delay = backoff.next_delay();
                tracing::warn!(error = %err, delay_secs = delay.as_secs(), "stream consumer disconnected, reconnecting");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_up_to_sixty_seconds_then_holds() {
        let mut backoff = ReconnectBackoff::default();
        let delays: Vec<_> = (0..8).map(|_| backoff.next_delay()).collect();
        assert_eq!(delays[0], Duration::from_secs(1));
        assert_eq!(delays[1], Duration::from_secs(2));
        assert_eq!(delays[2], Duration::from_secs(4));
        assert_eq!(delays.last().copied().unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn reset_returns_to_minimum() {
        let mut backoff = ReconnectBackoff::default();
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }
}
