//! Circuit breaker for the lock-store connection.
//!
//! When the lock store goes down, every seat-lock call would otherwise
//! block on a connect timeout and the intake surfaces would drown. The
//! breaker counts consecutive failures; past a threshold it rejects calls
//! immediately for a cooldown window (`REDIS_CIRCUIT_OPEN_MS`), then lets
//! a probe call through and closes again after enough successes.
//!
//! # States
//!
//! - **Closed**: calls pass through; consecutive failures are counted.
//! - **Open**: calls are rejected without touching the store.
//! - **HalfOpen**: after the cooldown, probe calls are admitted; enough
//!   successes close the circuit, any failure reopens it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::RwLock;

/// Breaker tuning.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that trip the circuit.
    pub failure_threshold: u32,
    /// How long to reject calls once open.
    pub open_for: Duration,
    /// Successes in `HalfOpen` required to close again.
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_for: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

impl CircuitBreakerConfig {
    /// Config with a specific cooldown window, other fields defaulted.
    #[must_use]
    pub fn with_open_window(open_for: Duration) -> Self {
        Self {
            open_for,
            ..Self::default()
        }
    }
}

/// Observable breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Normal operation.
    Closed,
    /// Rejecting calls.
    Open,
    /// Probing for recovery.
    HalfOpen,
}

/// Error from a breaker-wrapped call.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The circuit is open; the operation was not attempted.
    #[error("circuit breaker is open")]
    Open,
    /// The operation ran and failed.
    #[error("operation failed: {0}")]
    Inner(E),
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    half_open_successes: u32,
    opened_at: Option<Instant>,
}

/// Shared circuit breaker; clones observe the same circuit.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: Arc<CircuitBreakerConfig>,
    inner: Arc<RwLock<Inner>>,
}

impl CircuitBreaker {
    /// Create a breaker with the given tuning.
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config: Arc::new(config),
            inner: Arc::new(RwLock::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                half_open_successes: 0,
                opened_at: None,
            })),
        }
    }

    /// Current state (for health reporting).
    pub async fn state(&self) -> BreakerState {
        self.inner.read().await.state
    }

    /// Run `operation` through the breaker.
    ///
    /// # Errors
    ///
    /// [`BreakerError::Open`] when the circuit rejects the call,
    /// [`BreakerError::Inner`] when the operation itself fails.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.admit().await {
            metrics::counter!("seatline.breaker.rejected").increment(1);
            return Err(BreakerError::Open);
        }

        match operation().await {
            Ok(value) => {
                self.record_success().await;
                Ok(value)
            },
            Err(err) => {
                self.record_failure().await;
                metrics::counter!("seatline.breaker.failures").increment(1);
                Err(BreakerError::Inner(err))
            },
        }
    }

    async fn admit(&self) -> bool {
        let mut inner = self.inner.write().await;
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed());
                if elapsed.is_some_and(|e| e >= self.config.open_for) {
                    tracing::info!("circuit breaker OPEN -> HALF_OPEN");
                    inner.state = BreakerState::HalfOpen;
                    inner.half_open_successes = 0;
                    true
                } else {
                    false
                }
            },
        }
    }

    async fn record_success(&self) {
        let mut inner = self.inner.write().await;
        match inner.state {
            BreakerState::Closed => inner.consecutive_failures = 0,
            BreakerState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.success_threshold {
                    tracing::info!(
                        successes = inner.half_open_successes,
                        "circuit breaker HALF_OPEN -> CLOSED"
                    );
                    inner.state = BreakerState::Closed;
                    inner.consecutive_failures = 0;
                    inner.opened_at = None;
                }
            },
            BreakerState::Open => {},
        }
    }

    async fn record_failure(&self) {
        let mut inner = self.inner.write().await;
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    tracing::warn!(
                        failures = inner.consecutive_failures,
                        open_for_ms = self.config.open_for.as_millis(),
                        "circuit breaker CLOSED -> OPEN"
                    );
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            },
            BreakerState::HalfOpen => {
                tracing::warn!("circuit breaker HALF_OPEN -> OPEN (probe failed)");
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                inner.half_open_successes = 0;
            },
            BreakerState::Open => {},
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn breaker(failures: u32, open_for: Duration) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: failures,
            open_for,
            success_threshold: 2,
        })
    }

    #[tokio::test]
    async fn stays_closed_on_success() {
        let b = breaker(3, Duration::from_secs(30));
        let out = b.call(|| async { Ok::<_, &str>(7) }).await;
        assert!(matches!(out, Ok(7)));
        assert_eq!(b.state().await, BreakerState::Closed);
    }

    #[tokio::test]
    async fn opens_after_consecutive_failures() {
        let b = breaker(3, Duration::from_secs(30));
        for _ in 0..3 {
            let _ = b.call(|| async { Err::<(), _>("down") }).await;
        }
        assert_eq!(b.state().await, BreakerState::Open);

        let out = b.call(|| async { Ok::<_, &str>(1) }).await;
        assert!(matches!(out, Err(BreakerError::Open)));
    }

    #[tokio::test]
    async fn success_resets_failure_count() {
        let b = breaker(3, Duration::from_secs(30));
        for _ in 0..2 {
            let _ = b.call(|| async { Err::<(), _>("down") }).await;
        }
        let _ = b.call(|| async { Ok::<_, &str>(()) }).await;
        for _ in 0..2 {
            let _ = b.call(|| async { Err::<(), _>("down") }).await;
        }
        // Still under threshold thanks to the interleaved success.
        assert_eq!(b.state().await, BreakerState::Closed);
    }

    #[tokio::test]
    async fn recovers_through_half_open() {
        let b = breaker(2, Duration::from_millis(50));
        for _ in 0..2 {
            let _ = b.call(|| async { Err::<(), _>("down") }).await;
        }
        assert_eq!(b.state().await, BreakerState::Open);

        tokio::time::sleep(Duration::from_millis(80)).await;

        for _ in 0..2 {
            let out = b.call(|| async { Ok::<_, &str>(()) }).await;
            assert!(out.is_ok());
        }
        assert_eq!(b.state().await, BreakerState::Closed);
    }

    #[tokio::test]
    async fn reopens_when_probe_fails() {
        let b = breaker(2, Duration::from_millis(50));
        for _ in 0..2 {
            let _ = b.call(|| async { Err::<(), _>("down") }).await;
        }
        tokio::time::sleep(Duration::from_millis(80)).await;

        let _ = b.call(|| async { Err::<(), _>("still down") }).await;
        assert_eq!(b.state().await, BreakerState::Open);
    }
}
