//! Error taxonomy shared by every Seatline crate.
//!
//! Errors classify along two orthogonal axes:
//!
//! - **Retryability**: infrastructure transients (database or lock-store
//!   outage, open circuit, rate limits) are retryable with the same
//!   idempotency key; domain rejections and authentication failures are
//!   not.
//! - **Locality**: domain errors carry a stable wire code
//!   ([`Error::code`]) rendered by the HTTP layer with a specific 4xx
//!   status; infrastructure errors render as 503 `RETRY_LATER`.

use std::fmt;

use thiserror::Error;

use crate::status::BookingStatus;
use crate::types::BookingId;

/// Result type alias for Seatline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// All failure modes of the reservation core.
#[derive(Debug, Error)]
pub enum Error {
    // ─── Domain rejections ───────────────────────────────────────────

    /// Booking does not exist.
    #[error("booking {0} not found")]
    BookingNotFound(BookingId),

    /// Trip does not exist or its schedule does not match the request.
    #[error("trip not found")]
    TripNotFound,

    /// Cancellation requires a CONFIRMED booking.
    #[error("booking is {status}, not CONFIRMED")]
    BookingNotConfirmed {
        /// Observed status.
        status: BookingStatus,
    },

    /// The requesting actor does not own the booking.
    #[error("actor does not own this booking")]
    BookingOwnershipInvalid,

    /// Another cancellation holds the per-booking lock.
    #[error("booking is locked by a concurrent operation")]
    BookingLocked,

    /// Seats cannot be blocked because a CONFIRMED booking holds them.
    #[error("seats already confirmed: {seats:?}")]
    SeatAlreadyConfirmed {
        /// The offending seat numbers.
        seats: Vec<i32>,
    },

    /// Not enough free seats to satisfy the request.
    #[error("requested {requested} seats, only {available} available")]
    SeatsUnavailable {
        /// Seats requested.
        requested: u32,
        /// Seats actually available.
        available: u32,
    },

    /// The transition is not in the allowed-transitions table, or a racing
    /// transition won the guarded update.
    #[error("disallowed booking transition {from} -> {to}")]
    DisallowedTransition {
        /// Status the transition started from.
        from: BookingStatus,
        /// Requested target status.
        to: BookingStatus,
    },

    /// Refund request exceeds the recorded paid balance.
    #[error("refund of {requested_cents} exceeds paid balance of {paid_cents}")]
    OverRefund {
        /// Requested refund, in cents.
        requested_cents: i64,
        /// Recorded balance, in cents.
        paid_cents: i64,
    },

    /// A takeover is already active for this session.
    #[error("takeover already active for session")]
    TakeoverAlreadyActive,

    /// Request failed structural or semantic validation.
    #[error("validation failed: {0}")]
    Validation(String),

    // ─── Authentication failures (never retryable) ───────────────────

    /// Webhook or token signature did not verify.
    #[error("signature verification failed")]
    SignatureInvalid,

    /// A nonce was presented twice within its TTL.
    #[error("replay detected")]
    ReplayDetected,

    // ─── Infrastructure transients (retryable) ───────────────────────

    /// Relational store failure.
    #[error("database error: {0}")]
    Database(String),

    /// Lock store failure.
    #[error("lock store error: {0}")]
    LockStore(String),

    /// Lock-store circuit breaker is open.
    #[error("lock store circuit is open")]
    CircuitOpen,

    /// Per-IP rate limit exceeded.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds until the bucket refills.
        retry_after_secs: u64,
    },

    /// Another delivery with the same idempotency key is in flight.
    #[error("duplicate request in flight")]
    DuplicateInFlight,

    /// Snapshot (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Wrap a database driver error.
    pub fn database(err: impl fmt::Display) -> Self {
        Self::Database(err.to_string())
    }

    /// Wrap a lock-store driver error.
    pub fn lock_store(err: impl fmt::Display) -> Self {
        Self::LockStore(err.to_string())
    }

    /// Whether a caller may retry with the same idempotency key.
    ///
    /// The ledger guarantees at-most-once effect, so retrying a transient
    /// failure is always safe.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::LockStore(_)
                | Self::CircuitOpen
                | Self::RateLimited { .. }
                | Self::DuplicateInFlight
        )
    }

    /// Stable wire code for structured error responses.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::BookingNotFound(_) => "BOOKING_NOT_FOUND",
            Self::TripNotFound => "TRIP_NOT_FOUND",
            Self::BookingNotConfirmed { .. } => "BOOKING_NOT_CONFIRMED",
            Self::BookingOwnershipInvalid => "BOOKING_OWNERSHIP_INVALID",
            Self::BookingLocked => "BOOKING_LOCKED",
            Self::SeatAlreadyConfirmed { .. } => "SEAT_ALREADY_CONFIRMED",
            Self::SeatsUnavailable { .. } => "SEATS_UNAVAILABLE",
            Self::DisallowedTransition { .. } => "DISALLOWED_TRANSITION",
            Self::OverRefund { .. } => "OVER_REFUND",
            Self::TakeoverAlreadyActive => "TAKEOVER_ALREADY_ACTIVE",
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::SignatureInvalid => "SIGNATURE_INVALID",
            Self::ReplayDetected => "REPLAY_DETECTED",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::DuplicateInFlight | Self::Database(_) | Self::LockStore(_) | Self::CircuitOpen => {
                "RETRY_LATER"
            },
            Self::Serialization(_) => "INTERNAL",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_axes() {
        assert!(Error::Database("down".into()).is_retryable());
        assert!(Error::CircuitOpen.is_retryable());
        assert!(Error::DuplicateInFlight.is_retryable());
        assert!(!Error::SignatureInvalid.is_retryable());
        assert!(!Error::ReplayDetected.is_retryable());
        assert!(!Error::BookingOwnershipInvalid.is_retryable());
        assert!(
            !Error::DisallowedTransition {
                from: BookingStatus::Confirmed,
                to: BookingStatus::Expired,
            }
            .is_retryable()
        );
    }

    #[test]
    fn infra_errors_share_retry_later_code() {
        assert_eq!(Error::Database("x".into()).code(), "RETRY_LATER");
        assert_eq!(Error::LockStore("x".into()).code(), "RETRY_LATER");
        assert_eq!(Error::CircuitOpen.code(), "RETRY_LATER");
        assert_eq!(Error::DuplicateInFlight.code(), "RETRY_LATER");
    }

    #[test]
    fn domain_codes_are_specific() {
        assert_eq!(
            Error::BookingNotFound(BookingId::new(1)).code(),
            "BOOKING_NOT_FOUND"
        );
        assert_eq!(
            Error::SeatAlreadyConfirmed { seats: vec![1] }.code(),
            "SEAT_ALREADY_CONFIRMED"
        );
    }
}
