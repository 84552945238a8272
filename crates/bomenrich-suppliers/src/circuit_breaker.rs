//! Three-state circuit breaker: closed → open after N consecutive failures,
//! open → half-open after a cooldown, and a success threshold in half-open
//! closes it again.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    fn from_tag(tag: u8) -> Self {
        match tag {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }

    fn tag(self) -> u8 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Per-supplier circuit breaker. Atomics carry the hot-path state so
/// `can_execute` never blocks on a lock; `last_state_change` lives behind a
/// `RwLock<Instant>` since `Instant` isn't atomic.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: AtomicU8,
    failure_count: AtomicU32,
    success_count: AtomicU32,
    last_state_change: RwLock<Instant>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: AtomicU8::new(CircuitState::Closed.tag()),
            failure_count: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
            last_state_change: RwLock::new(Instant::now()),
        }
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from_tag(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, to: CircuitState) {
        self.state.store(to.tag(), Ordering::Release);
        *self.last_state_change.write().unwrap() = Instant::now();
        tracing::info!(breaker = %self.name, state = ?to, "circuit breaker state change");
    }

    /// Returns whether a call is allowed right now. In `Open`, flips to
    /// `HalfOpen` once the cooldown has elapsed and admits exactly the call
    /// that observed the flip.
    pub fn can_execute(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = self.last_state_change.read().unwrap().elapsed();
                if elapsed >= self.config.timeout {
                    self.success_count.store(0, Ordering::Relaxed);
                    self.transition(CircuitState::HalfOpen);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::Relaxed);

        if self.state() == CircuitState::HalfOpen {
            let successes = self.success_count.fetch_add(1, Ordering::Relaxed) + 1;
            if successes >= self.config.success_threshold {
                self.success_count.store(0, Ordering::Relaxed);
                self.transition(CircuitState::Closed);
            }
        }
    }

    pub fn record_failure(&self) {
        let failures = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;

        if self.state() == CircuitState::HalfOpen {
            self.success_count.store(0, Ordering::Relaxed);
            self.transition(CircuitState::Open);
        } else if self.state() == CircuitState::Closed && failures >= self.config.failure_threshold {
            self.transition(CircuitState::Open);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_breaker() -> CircuitBreaker {
        CircuitBreaker::new(
            "mouser",
            CircuitBreakerConfig { failure_threshold: 3, success_threshold: 2, timeout: Duration::from_millis(20) },
        )
    }

    #[test]
    fn opens_after_consecutive_failures() {
        let cb = fast_breaker();
        for _ in 0..2 {
            cb.record_failure();
            assert_eq!(cb.state(), CircuitState::Closed);
        }
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.can_execute());
    }

    #[test]
    fn success_resets_failure_count_while_closed() {
        let cb = fast_breaker();
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let cb = fast_breaker();
        for _ in 0..3 {
            cb.record_failure();
        }
        std::thread::sleep(Duration::from_millis(30));
        assert!(cb.can_execute());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn half_open_closes_after_success_threshold() {
        let cb = fast_breaker();
        for _ in 0..3 {
            cb.record_failure();
        }
        std::thread::sleep(Duration::from_millis(30));
        assert!(cb.can_execute());
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
