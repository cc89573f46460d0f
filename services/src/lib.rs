//! # Seatline Services
//!
//! The coordinators that turn verified external events into consistent
//! booking lifecycle transitions. Every public operation here is designed
//! to be invoked through the idempotency ledger, so a redelivered webhook
//! or a retried operator action has at-most-once effect.
//!
//! Layering:
//!
//! - [`allocation`] / [`availability`]: seat planning and accounting.
//! - [`state_machine`]: the only code path that flips `bookings.status`,
//!   running the inventory-release hook before the guarded flip.
//! - [`holds`], [`payments`], [`cancellations`], [`tickets`]: the
//!   coordinators proper.
//! - [`reconcile`]: hold expiry and orphaned-lock reconvergence.
//! - [`takeover`], [`settlement`], [`chat`]: operator control, balance
//!   accounting and the chat-side flow.

pub mod allocation;
pub mod availability;
pub mod cancellations;
pub mod chat;
pub mod holds;
pub mod overrides;
pub mod payments;
pub mod reconcile;
pub mod settlement;
pub mod state_machine;
pub mod takeover;
pub mod tickets;
pub mod views;

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use seatline_locks::{BlockedSeatCache, SeatLockService};

pub use chat::{ChatClient, ChatMessage, MessageKind, TracingChatClient};
pub use views::{BookingView, CancellationView};

/// Tuning shared by the coordinators.
#[derive(Debug, Clone)]
pub struct ServicesConfig {
    /// How long a hold reserves its seats.
    pub hold_duration: Duration,
    /// Grace added to seat-lock TTLs beyond the hold deadline, so the
    /// reconciliation loop (not Redis expiry) is the arbiter of crossing
    /// the deadline.
    pub seat_lock_grace: Duration,
    /// TTL of the per-booking cancellation guard.
    pub cancel_lock_ttl: Duration,
    /// Platform commission in basis points.
    pub commission_rate_bps: i64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            hold_duration: Duration::from_secs(10 * 60),
            seat_lock_grace: Duration::from_secs(60),
            cancel_lock_ttl: Duration::from_secs(20),
            commission_rate_bps: 1_000,
        }
    }
}

/// The coordinator service bundle.
///
/// Holds the long-lived infra handles (pool, lock store facades) as
/// explicit dependencies so tests can wire fakes; nothing here is a
/// process-wide singleton.
#[derive(Clone)]
pub struct BookingServices {
    pub(crate) pool: PgPool,
    pub(crate) locks: SeatLockService,
    pub(crate) blocked_cache: BlockedSeatCache,
    pub(crate) chat_client: Arc<dyn ChatClient>,
    pub(crate) config: ServicesConfig,
}

impl BookingServices {
    /// Assemble the service bundle.
    #[must_use]
    pub fn new(
        pool: PgPool,
        locks: SeatLockService,
        blocked_cache: BlockedSeatCache,
        chat_client: Arc<dyn ChatClient>,
        config: ServicesConfig,
    ) -> Self {
        Self {
            pool,
            locks,
            blocked_cache,
            chat_client,
            config,
        }
    }

    /// The underlying pool, for read-only queries in the web layer.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Seat-lock TTL used for new holds.
    pub(crate) fn seat_lock_ttl(&self) -> Duration {
        self.config.hold_duration + self.config.seat_lock_grace
    }
}
