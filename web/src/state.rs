//! Application state shared by all handlers.

use std::sync::Arc;

use seatline_locks::{LockStore, ReplayStore};
use seatline_postgres::IdempotencyLedger;
use seatline_services::BookingServices;

use crate::rate_limit::RateLimiter;

/// HMAC secrets for the intake surfaces.
#[derive(Clone)]
pub struct Secrets {
    /// Chat-webhook shared secret.
    pub chat_webhook: String,
    /// Payment-webhook shared secret.
    pub payment_webhook: String,
    /// Customer booking-token secret.
    pub booking_token: String,
}

/// Per-IP per-minute caps.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    /// Cap for both webhook surfaces.
    pub webhooks_per_minute: u32,
    /// Cap for the cancellation endpoint.
    pub cancel_per_minute: u32,
}

/// Everything a handler needs, cloned cheaply per request.
#[derive(Clone)]
pub struct AppState {
    /// Coordinator services.
    pub services: Arc<BookingServices>,
    /// Idempotency envelope.
    pub ledger: IdempotencyLedger,
    /// Replay-nonce store.
    pub replay: ReplayStore,
    /// Lock store handle (readiness pings).
    pub lock_store: LockStore,
    /// Token buckets.
    pub rate_limiter: Arc<RateLimiter>,
    /// Surface secrets.
    pub secrets: Arc<Secrets>,
    /// Rate caps.
    pub limits: RateLimits,
}

impl AppState {
    /// Assemble the state bundle.
    #[must_use]
    pub fn new(
        services: Arc<BookingServices>,
        ledger: IdempotencyLedger,
        lock_store: &LockStore,
        secrets: Secrets,
        limits: RateLimits,
    ) -> Self {
        Self {
            services,
            ledger,
            replay: lock_store.replay(),
            lock_store: lock_store.clone(),
            rate_limiter: Arc::new(RateLimiter::new()),
            secrets: Arc::new(secrets),
            limits,
        }
    }
}
