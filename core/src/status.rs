//! Booking status alphabet, legacy aliases and the transition table.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Canonical booking lifecycle states.
///
/// `Hold` is the only non-terminal state with inventory consequences: a
/// booking in `Hold` owns seat locks in the lock store until it is
/// confirmed, cancelled or expired. `Cancelled` and `Expired` are sinks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BookingStatus {
    /// Seats are locked and awaiting payment or a ticket.
    Hold,
    /// Payment or ticket received; seats are permanently assigned.
    Confirmed,
    /// Cancelled by customer, operator or admin.
    Cancelled,
    /// Hold timed out or its locks were lost.
    Expired,
}

impl BookingStatus {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hold => "HOLD",
            Self::Confirmed => "CONFIRMED",
            Self::Cancelled => "CANCELLED",
            Self::Expired => "EXPIRED",
        }
    }

    /// Parse a stored status, normalizing legacy aliases.
    ///
    /// Historical rows carry `pending` / `payment_pending` (both holds)
    /// and `rejected` (a cancellation). Reads normalize; writes always use
    /// the canonical alphabet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an unknown status string.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "HOLD" | "pending" | "payment_pending" => Ok(Self::Hold),
            "CONFIRMED" => Ok(Self::Confirmed),
            "CANCELLED" | "rejected" => Ok(Self::Cancelled),
            "EXPIRED" => Ok(Self::Expired),
            other => Err(Error::Validation(format!("unknown booking status: {other}"))),
        }
    }

    /// Whether this state admits no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Expired)
    }

    /// The allowed-transitions table.
    ///
    /// ```text
    /// HOLD      -> CONFIRMED | CANCELLED | EXPIRED | HOLD (no-op)
    /// CONFIRMED -> CANCELLED
    /// CANCELLED, EXPIRED -> (sinks)
    /// ```
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        match self {
            Self::Hold => true,
            Self::Confirmed => matches!(target, Self::Cancelled),
            Self::Cancelled | Self::Expired => false,
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who requested a cancellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelActor {
    /// The booking's customer, authenticated by booking token + phone.
    Customer,
    /// The operator owning the booking's route.
    Operator,
    /// A service administrator.
    Admin,
}

impl CancelActor {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Operator => "operator",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for CancelActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a seat override.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideStatus {
    /// Seat is withheld from new holds.
    Blocked,
    /// Seat is available again.
    Unblocked,
}

impl OverrideStatus {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blocked => "blocked",
            Self::Unblocked => "unblocked",
        }
    }

    /// Parse a stored override status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an unknown string.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "blocked" => Ok(Self::Blocked),
            "unblocked" => Ok(Self::Unblocked),
            other => Err(Error::Validation(format!("unknown override status: {other}"))),
        }
    }
}

/// Status machine of an idempotency ledger row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerStatus {
    /// Handler is (or was, if stale) in flight.
    Started,
    /// Handler finished; response snapshot is authoritative.
    Completed,
    /// Handler failed; a retried key re-runs it.
    Failed,
}

impl LedgerStatus {
    /// Database string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse a stored ledger status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an unknown string.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "started" => Ok(Self::Started),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(Error::Validation(format!("unknown ledger status: {other}"))),
        }
    }
}

/// What a payment-gateway status string means for a held booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Payment settled; the hold confirms.
    Confirmed,
    /// Payment failed or was abandoned; the hold expires.
    Expired,
}

impl PaymentOutcome {
    /// Map a gateway status string to its booking outcome.
    ///
    /// Gateways are inconsistent about spelling; all observed success and
    /// failure variants map here. Unknown strings return `None` and are
    /// rejected before the idempotency envelope runs.
    #[must_use]
    pub fn from_gateway(status: &str) -> Option<Self> {
        match status {
            "SUCCESS" | "SUCCEEDED" | "PAID" => Some(Self::Confirmed),
            "FAILED" | "FAILURE" | "CANCELLED" => Some(Self::Expired),
            _ => None,
        }
    }

    /// The booking status this outcome transitions a hold to.
    #[must_use]
    pub const fn target_status(self) -> BookingStatus {
        match self {
            Self::Confirmed => BookingStatus::Confirmed,
            Self::Expired => BookingStatus::Expired,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const ALL: [BookingStatus; 4] = [
        BookingStatus::Hold,
        BookingStatus::Confirmed,
        BookingStatus::Cancelled,
        BookingStatus::Expired,
    ];

    #[test]
    fn transition_table_matches_lifecycle() {
        use BookingStatus::{Cancelled, Confirmed, Expired, Hold};

        // HOLD can go anywhere, including a no-op re-hold.
        for target in ALL {
            assert!(Hold.can_transition_to(target));
        }

        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(!Confirmed.can_transition_to(Hold));
        assert!(!Confirmed.can_transition_to(Expired));
        assert!(!Confirmed.can_transition_to(Confirmed));

        // Terminal states are sinks.
        for source in [Cancelled, Expired] {
            for target in ALL {
                assert!(!source.can_transition_to(target));
            }
        }
    }

    #[test]
    fn legacy_aliases_normalize_on_read() {
        assert_eq!(BookingStatus::parse("pending").unwrap(), BookingStatus::Hold);
        assert_eq!(
            BookingStatus::parse("payment_pending").unwrap(),
            BookingStatus::Hold
        );
        assert_eq!(
            BookingStatus::parse("rejected").unwrap(),
            BookingStatus::Cancelled
        );
    }

    #[test]
    fn canonical_statuses_round_trip() {
        for status in ALL {
            assert_eq!(BookingStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(BookingStatus::parse("unknown").is_err());
    }

    #[test]
    fn gateway_status_mapping() {
        for s in ["SUCCESS", "SUCCEEDED", "PAID"] {
            assert_eq!(
                PaymentOutcome::from_gateway(s),
                Some(PaymentOutcome::Confirmed)
            );
        }
        for s in ["FAILED", "FAILURE", "CANCELLED"] {
            assert_eq!(PaymentOutcome::from_gateway(s), Some(PaymentOutcome::Expired));
        }
        assert_eq!(PaymentOutcome::from_gateway("REFUNDED"), None);
        assert_eq!(PaymentOutcome::from_gateway("success"), None);
    }

    #[test]
    fn ledger_status_round_trip() {
        for status in [
            LedgerStatus::Started,
            LedgerStatus::Completed,
            LedgerStatus::Failed,
        ] {
            assert_eq!(LedgerStatus::parse(status.as_str()).unwrap(), status);
        }
    }
}
