//! In-process token-bucket rate limiting per (scope, IP).
//!
//! Process-local by design: webhook retries and cancel hammering are
//! per-instance concerns, and cluster-wide limiting is out of scope.
//! Buckets refill continuously at `limit / 60` tokens per second and cap
//! at the per-minute limit.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Instant;

use seatline_core::{Error, Result};
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket limiter keyed by scope and client IP.
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<(String, IpAddr), Bucket>>,
}

impl RateLimiter {
    /// Create an empty limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take one token from the bucket for `(scope, ip)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RateLimited`] when the bucket is empty, with the
    /// time until one token refills.
    pub async fn check(&self, scope: &str, limit_per_minute: u32, ip: IpAddr) -> Result<()> {
        if limit_per_minute == 0 {
            return Err(Error::RateLimited {
                retry_after_secs: 60,
            });
        }

        let capacity = f64::from(limit_per_minute);
        let refill_per_sec = capacity / 60.0;
        let now = Instant::now();

        let mut buckets = self.buckets.lock().await;
        let bucket = buckets
            .entry((scope.to_string(), ip))
            .or_insert(Bucket {
                tokens: capacity,
                last_refill: now,
            });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * refill_per_sec).min(capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - bucket.tokens;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let retry_after_secs = (deficit / refill_per_sec).ceil() as u64;

            metrics::counter!("seatline.rate_limit.rejected", "scope" => scope.to_string())
                .increment(1);
            tracing::warn!(scope, %ip, "rate limit exceeded");

            Err(Error::RateLimited {
                retry_after_secs: retry_after_secs.max(1),
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[tokio::test]
    async fn allows_up_to_the_limit() {
        let limiter = RateLimiter::new();
        for _ in 0..5 {
            limiter.check("webhooks", 5, ip(1)).await.unwrap();
        }
        let err = limiter.check("webhooks", 5, ip(1)).await.unwrap_err();
        assert!(matches!(err, Error::RateLimited { .. }));
    }

    #[tokio::test]
    async fn scopes_and_ips_are_independent() {
        let limiter = RateLimiter::new();
        for _ in 0..3 {
            limiter.check("webhooks", 3, ip(1)).await.unwrap();
        }
        // Same scope, other IP: fresh bucket.
        limiter.check("webhooks", 3, ip(2)).await.unwrap();
        // Same IP, other scope: fresh bucket.
        limiter.check("cancel", 3, ip(1)).await.unwrap();
    }

    #[tokio::test]
    async fn zero_limit_rejects_everything() {
        let limiter = RateLimiter::new();
        let err = limiter.check("webhooks", 0, ip(1)).await.unwrap_err();
        assert!(matches!(err, Error::RateLimited { .. }));
    }

    #[tokio::test]
    async fn rejection_reports_retry_after() {
        let limiter = RateLimiter::new();
        limiter.check("cancel", 1, ip(9)).await.unwrap();
        match limiter.check("cancel", 1, ip(9)).await {
            Err(Error::RateLimited { retry_after_secs }) => {
                assert!(retry_after_secs >= 1);
                assert!(retry_after_secs <= 60);
            },
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }
}
