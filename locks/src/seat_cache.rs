//! Blocked-seat cache.
//!
//! Mirrors the `inventory_overrides` blocked set into a Redis set per
//! route and travel date so availability reads do not need a table scan.
//! The database remains the source of truth; the mirror is replaced
//! wholesale on every block/unblock.

use redis::aio::ConnectionManager;
use seatline_core::{keys, Result, RouteId};
use seatline_runtime::CircuitBreaker;

use crate::map_breaker_error;

/// Redis mirror of blocked seats.
#[derive(Clone)]
pub struct BlockedSeatCache {
    conn: ConnectionManager,
    breaker: CircuitBreaker,
}

impl BlockedSeatCache {
    pub(crate) const fn new(conn: ConnectionManager, breaker: CircuitBreaker) -> Self {
        Self { conn, breaker }
    }

    /// Replace the cached blocked set for a route and date.
    ///
    /// Runs as one atomic pipeline so readers never observe a half-empty
    /// set.
    ///
    /// # Errors
    ///
    /// Retryable [`Error::LockStore`](seatline_core::Error::LockStore) /
    /// [`Error::CircuitOpen`](seatline_core::Error::CircuitOpen) on
    /// transport failure.
    pub async fn replace(
        &self,
        route_id: RouteId,
        trip_date: chrono::NaiveDate,
        blocked: &[i32],
    ) -> Result<()> {
        let key = keys::blocked_seats(route_id, trip_date);
        let mut conn = self.conn.clone();

        self.breaker
            .call(|| async move {
                let mut pipe = redis::pipe();
                pipe.atomic();
                pipe.del(&key).ignore();
                if !blocked.is_empty() {
                    pipe.sadd(&key, blocked).ignore();
                }
                let done: redis::RedisResult<()> = pipe.query_async(&mut conn).await;
                done
            })
            .await
            .map_err(map_breaker_error)?;

        tracing::debug!(%route_id, %trip_date, blocked = blocked.len(), "blocked-seat cache replaced");
        Ok(())
    }

    /// Read the cached blocked set, ascending.
    ///
    /// # Errors
    ///
    /// Retryable [`Error::LockStore`](seatline_core::Error::LockStore) /
    /// [`Error::CircuitOpen`](seatline_core::Error::CircuitOpen) on
    /// transport failure.
    pub async fn fetch(
        &self,
        route_id: RouteId,
        trip_date: chrono::NaiveDate,
    ) -> Result<Vec<i32>> {
        let key = keys::blocked_seats(route_id, trip_date);
        let mut conn = self.conn.clone();

        let mut seats: Vec<i32> = self
            .breaker
            .call(|| async move {
                redis::cmd("SMEMBERS").arg(&key).query_async(&mut conn).await
            })
            .await
            .map_err(map_breaker_error)?;

        seats.sort_unstable();
        Ok(seats)
    }
}
