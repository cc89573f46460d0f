//! # Seatline Locks
//!
//! Typed wrapper over the Redis lock store. Three facades share one
//! multiplexed connection and one circuit breaker:
//!
//! - [`SeatLockService`]: per-seat ownership tokens via atomic Lua
//!   scripts (acquire / extend / release-if-owner / force-expire).
//! - [`ReplayStore`]: one-time nonces for webhook replay protection.
//! - [`BlockedSeatCache`]: mirror of blocked seats per route and date
//!   for fast availability reads.
//!
//! Every operation runs behind the circuit breaker; when Redis is down
//! the breaker opens for a configurable window and calls fail fast with a
//! retryable error. Lock loss across a Redis crash is expected and is
//! resolved by the reconciliation loop, never here.

pub mod replay;
pub mod seat_cache;
pub mod seat_lock;

pub use replay::ReplayStore;
pub use seat_cache::BlockedSeatCache;
pub use seat_lock::{AcquireOutcome, ExpireOutcome, ExtendOutcome, ReleaseOutcome, SeatLockService};

use redis::aio::ConnectionManager;
use redis::Client;
use seatline_core::{Error, Result};
use seatline_runtime::{BreakerError, CircuitBreaker, CircuitBreakerConfig};

/// Shared handle to the lock store.
#[derive(Clone)]
pub struct LockStore {
    conn: ConnectionManager,
    breaker: CircuitBreaker,
}

impl LockStore {
    /// Connect to Redis and install the circuit breaker.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockStore`] when the connection cannot be
    /// established.
    pub async fn connect(url: &str, breaker_config: CircuitBreakerConfig) -> Result<Self> {
        let client = Client::open(url).map_err(Error::lock_store)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(Error::lock_store)?;

        Ok(Self {
            conn,
            breaker: CircuitBreaker::new(breaker_config),
        })
    }

    /// The seat-lock facade.
    #[must_use]
    pub fn seat_locks(&self) -> SeatLockService {
        SeatLockService::new(self.conn.clone(), self.breaker.clone())
    }

    /// The replay-nonce facade.
    #[must_use]
    pub fn replay(&self) -> ReplayStore {
        ReplayStore::new(self.conn.clone(), self.breaker.clone())
    }

    /// The blocked-seat cache facade.
    #[must_use]
    pub fn blocked_cache(&self) -> BlockedSeatCache {
        BlockedSeatCache::new(self.conn.clone(), self.breaker.clone())
    }

    /// Readiness ping.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockStore`] / [`Error::CircuitOpen`] when the
    /// store is unreachable.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        self.breaker
            .call(|| async move {
                let pong: redis::RedisResult<String> =
                    redis::cmd("PING").query_async(&mut conn).await;
                pong.map(|_| ())
            })
            .await
            .map_err(map_breaker_error)
    }
}

/// Map a breaker-wrapped Redis failure onto the shared error taxonomy.
pub(crate) fn map_breaker_error(err: BreakerError<redis::RedisError>) -> Error {
    match err {
        BreakerError::Open => Error::CircuitOpen,
        BreakerError::Inner(e) => Error::lock_store(e),
    }
}
