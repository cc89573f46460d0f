//! Atomic seat-lock operations.
//!
//! Each operation is a single Lua script, so partial states are
//! impossible: the owner check and the mutation happen in one Redis
//! command slot. `redis::Script` executes by hash (`EVALSHA`) and falls
//! back to inline `EVAL` when the server's script cache has been flushed,
//! e.g. after a restart.
//!
//! Numeric return codes from the scripts map to typed outcomes at this
//! boundary; callers never see raw integers.

use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::Script;
use seatline_core::{Error, Result};
use seatline_runtime::CircuitBreaker;

use crate::map_breaker_error;

/// `SET key owner NX PX ttl`; on conflict, distinguish re-acquire by the
/// same owner (without touching the remaining TTL) from foreign
/// ownership.
const ACQUIRE_LUA: &str = r"
if redis.call('SET', KEYS[1], ARGV[1], 'NX', 'PX', ARGV[2]) then
    return 1
end
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return 2
end
return 0
";

const EXTEND_LUA: &str = r"
local owner = redis.call('GET', KEYS[1])
if owner == false then
    return -1
end
if owner ~= ARGV[1] then
    return 0
end
redis.call('PEXPIRE', KEYS[1], ARGV[2])
return 1
";

const RELEASE_LUA: &str = r"
local owner = redis.call('GET', KEYS[1])
if owner == false then
    return -1
end
if owner ~= ARGV[1] then
    return 0
end
redis.call('DEL', KEYS[1])
return 1
";

/// Result of an acquire attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Lock was free and is now owned by the caller.
    Acquired,
    /// Caller already owns the lock; TTL is unchanged.
    AlreadyOwned,
    /// A different owner holds the lock.
    LockedByOther,
}

/// Result of an extend attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendOutcome {
    /// TTL was reset to the requested duration.
    Extended,
    /// Lock exists but belongs to someone else.
    NotOwner,
    /// Lock does not exist.
    NotFound,
}

/// Result of an owner-checked release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Lock deleted.
    Released,
    /// Lock exists but belongs to someone else.
    NotOwner,
    /// Lock does not exist.
    NotFound,
}

/// Result of a force-expire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpireOutcome {
    /// Lock deleted.
    Released,
    /// Lock did not exist.
    NotFound,
}

/// Typed facade over the lock scripts.
#[derive(Clone)]
pub struct SeatLockService {
    conn: ConnectionManager,
    breaker: CircuitBreaker,
}

impl SeatLockService {
    pub(crate) const fn new(conn: ConnectionManager, breaker: CircuitBreaker) -> Self {
        Self { conn, breaker }
    }

    async fn run_script(&self, script: &str, key: &str, args: &[String]) -> Result<i64> {
        let mut conn = self.conn.clone();
        let script = Script::new(script);
        let mut invocation = script.key(key);
        for arg in args {
            invocation.arg(arg);
        }

        self.breaker
            .call(|| async move {
                let code: redis::RedisResult<i64> = invocation.invoke_async(&mut conn).await;
                code
            })
            .await
            .map_err(map_breaker_error)
    }

    /// Try to take ownership of `key` for `owner` with the given TTL.
    ///
    /// Re-acquiring an already-owned key succeeds but does **not** extend
    /// the remaining TTL; use [`extend`](Self::extend) for that.
    ///
    /// # Errors
    ///
    /// Retryable [`Error::LockStore`] / [`Error::CircuitOpen`] on
    /// transport failure.
    pub async fn acquire(&self, key: &str, owner: &str, ttl: Duration) -> Result<AcquireOutcome> {
        let code = self
            .run_script(
                ACQUIRE_LUA,
                key,
                &[owner.to_string(), ttl.as_millis().to_string()],
            )
            .await?;

        let outcome = match code {
            1 => AcquireOutcome::Acquired,
            2 => AcquireOutcome::AlreadyOwned,
            0 => AcquireOutcome::LockedByOther,
            other => {
                return Err(Error::LockStore(format!(
                    "acquire script returned unknown code {other}"
                )))
            },
        };

        if outcome == AcquireOutcome::Acquired {
            metrics::counter!("seatline.locks.acquired").increment(1);
        }
        tracing::debug!(key, owner, ?outcome, "seat lock acquire");
        Ok(outcome)
    }

    /// Reset the TTL of a lock the caller owns.
    ///
    /// # Errors
    ///
    /// Retryable [`Error::LockStore`] / [`Error::CircuitOpen`] on
    /// transport failure.
    pub async fn extend(&self, key: &str, owner: &str, ttl: Duration) -> Result<ExtendOutcome> {
        let code = self
            .run_script(
                EXTEND_LUA,
                key,
                &[owner.to_string(), ttl.as_millis().to_string()],
            )
            .await?;

        match code {
            1 => Ok(ExtendOutcome::Extended),
            0 => Ok(ExtendOutcome::NotOwner),
            -1 => Ok(ExtendOutcome::NotFound),
            other => Err(Error::LockStore(format!(
                "extend script returned unknown code {other}"
            ))),
        }
    }

    /// Delete a lock the caller owns.
    ///
    /// # Errors
    ///
    /// Retryable [`Error::LockStore`] / [`Error::CircuitOpen`] on
    /// transport failure.
    pub async fn release(&self, key: &str, owner: &str) -> Result<ReleaseOutcome> {
        let code = self
            .run_script(RELEASE_LUA, key, &[owner.to_string()])
            .await?;

        let outcome = match code {
            1 => ReleaseOutcome::Released,
            0 => ReleaseOutcome::NotOwner,
            -1 => ReleaseOutcome::NotFound,
            other => {
                return Err(Error::LockStore(format!(
                    "release script returned unknown code {other}"
                )))
            },
        };

        if outcome == ReleaseOutcome::Released {
            metrics::counter!("seatline.locks.released").increment(1);
        }
        tracing::debug!(key, owner, ?outcome, "seat lock release");
        Ok(outcome)
    }

    /// Force-delete a lock regardless of owner.
    ///
    /// Reserved for coordinators that have already proven domain
    /// authority through the booking state machine.
    ///
    /// # Errors
    ///
    /// Retryable [`Error::LockStore`] / [`Error::CircuitOpen`] on
    /// transport failure.
    pub async fn expire(&self, key: &str) -> Result<ExpireOutcome> {
        let mut conn = self.conn.clone();
        let deleted: i64 = self
            .breaker
            .call(|| async move {
                redis::cmd("DEL").arg(key).query_async(&mut conn).await
            })
            .await
            .map_err(map_breaker_error)?;

        if deleted > 0 {
            metrics::counter!("seatline.locks.force_expired").increment(1);
            Ok(ExpireOutcome::Released)
        } else {
            Ok(ExpireOutcome::NotFound)
        }
    }

    /// Whether at least one of the keys still exists.
    ///
    /// Used by orphan reconciliation: a hold none of whose keys survive
    /// has lost its locks to a store crash.
    ///
    /// # Errors
    ///
    /// Retryable [`Error::LockStore`] / [`Error::CircuitOpen`] on
    /// transport failure.
    pub async fn any_exists(&self, keys: &[String]) -> Result<bool> {
        if keys.is_empty() {
            return Ok(false);
        }

        let mut conn = self.conn.clone();
        let count: i64 = self
            .breaker
            .call(|| async move {
                let mut cmd = redis::cmd("EXISTS");
                for key in keys {
                    cmd.arg(key);
                }
                cmd.query_async(&mut conn).await
            })
            .await
            .map_err(map_breaker_error)?;

        Ok(count > 0)
    }
}
