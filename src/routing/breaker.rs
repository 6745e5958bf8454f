//! Process-wide three-state circuit breaker (spec §4.7).
//!
//! CLOSED → OPEN after `breaker_failure_threshold` consecutive failures.
//! OPEN short-circuits every request for `breaker_timeout`, then the next
//! request transitions to HALF_OPEN and is allowed through. One success in
//! HALF_OPEN closes and resets; one failure reopens it.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

struct Inner {
    state: State,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    failure_threshold: u32,
    timeout: Duration,
}

/// What the caller should do for this attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Proceed with the outbound call.
    Allow,
    /// Breaker is open; go straight to fallback.
    ShortCircuit,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: State::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
            failure_threshold,
            timeout,
        }
    }

    /// Call before attempting an outbound request.
    pub async fn admit(&self) -> Admission {
        let mut guard = self.inner.lock().await;
        match guard.state {
            State::Closed => Admission::Allow,
            State::HalfOpen => Admission::Allow,
            State::Open => {
                let elapsed = guard.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.timeout {
                    guard.state = State::HalfOpen;
                    info!("circuit breaker: OPEN -> HALF_OPEN, allowing probe");
                    Admission::Allow
                } else {
                    Admission::ShortCircuit
                }
            }
        }
    }

    pub async fn record_success(&self) {
        let mut guard = self.inner.lock().await;
        if guard.state != State::Closed {
            info!("circuit breaker: -> CLOSED after success");
        }
        guard.state = State::Closed;
        guard.consecutive_failures = 0;
        guard.opened_at = None;
    }

    pub async fn record_failure(&self) {
        let mut guard = self.inner.lock().await;
        match guard.state {
            State::HalfOpen => {
                warn!("circuit breaker: HALF_OPEN probe failed, -> OPEN");
                guard.state = State::Open;
                guard.opened_at = Some(Instant::now());
            }
            State::Closed => {
                guard.consecutive_failures += 1;
                if guard.consecutive_failures >= self.failure_threshold {
                    warn!(
                        failures = guard.consecutive_failures,
                        "circuit breaker: threshold reached, -> OPEN"
                    );
                    guard.state = State::Open;
                    guard.opened_at = Some(Instant::now());
                }
            }
            State::Open => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(30));
        for _ in 0..3 {
            assert_eq!(breaker.admit().await, Admission::Allow);
            breaker.record_failure().await;
        }
        assert_eq!(breaker.admit().await, Admission::ShortCircuit);
    }

    #[tokio::test]
    async fn half_open_success_closes() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(10));
        breaker.record_failure().await;
        assert_eq!(breaker.admit().await, Admission::ShortCircuit);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(breaker.admit().await, Admission::Allow);
        breaker.record_success().await;
        assert_eq!(breaker.admit().await, Admission::Allow);
    }

    #[tokio::test]
    async fn half_open_failure_reopens() {
        let breaker = CircuitBreaker::new(1, Duration::from_millis(10));
        breaker.record_failure().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(breaker.admit().await, Admission::Allow);
        breaker.record_failure().await;
        assert_eq!(breaker.admit().await, Admission::ShortCircuit);
    }
}
