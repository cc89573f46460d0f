//! One-time replay nonces.
//!
//! A nonce is registered with `SET … NX PX`, so the first presentation
//! within the TTL wins and every later one is a replay. Scopes keep the
//! intake surfaces from colliding (the same value may legitimately appear
//! on two different surfaces).

use std::time::Duration;

use redis::aio::ConnectionManager;
use seatline_core::{keys, Error, Result};
use seatline_runtime::CircuitBreaker;

use crate::map_breaker_error;

/// Nonce registry with short TTLs.
#[derive(Clone)]
pub struct ReplayStore {
    conn: ConnectionManager,
    breaker: CircuitBreaker,
}

impl ReplayStore {
    pub(crate) const fn new(conn: ConnectionManager, breaker: CircuitBreaker) -> Self {
        Self { conn, breaker }
    }

    /// Register a nonce; `Ok(())` on first presentation,
    /// [`Error::ReplayDetected`] when it was already seen within the TTL.
    ///
    /// # Errors
    ///
    /// [`Error::ReplayDetected`] on a replay; retryable
    /// [`Error::LockStore`] / [`Error::CircuitOpen`] on transport
    /// failure.
    #[allow(clippy::cast_possible_truncation)]
    pub async fn register(&self, scope: &str, value: &str, ttl: Duration) -> Result<()> {
        let key = keys::nonce(scope, value);
        let mut conn = self.conn.clone();

        let set: Option<String> = self
            .breaker
            .call(|| async move {
                redis::cmd("SET")
                    .arg(&key)
                    .arg(1)
                    .arg("NX")
                    .arg("PX")
                    .arg(ttl.as_millis() as u64)
                    .query_async(&mut conn)
                    .await
            })
            .await
            .map_err(map_breaker_error)?;

        if set.is_some() {
            Ok(())
        } else {
            metrics::counter!("seatline.replay.rejected", "scope" => scope.to_string())
                .increment(1);
            tracing::warn!(scope, "nonce replay rejected");
            Err(Error::ReplayDetected)
        }
    }
}
