//! Settlement balance accounting.
//!
//! Integer cents throughout; the commission rate is in basis points, so
//! `commission = gross * bps / 10_000` with floor division. Refunds may
//! never exceed the recorded paid balance.

use seatline_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Basis points in a whole.
pub const BPS_DENOMINATOR: i64 = 10_000;

/// Split of a booking's gross between platform and operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Price times seat count.
    pub gross_cents: i64,
    /// Platform share.
    pub commission_cents: i64,
    /// Operator payout (gross minus commission).
    pub payout_cents: i64,
}

/// Compute the settlement split for a booking.
#[must_use]
pub fn settle(price_cents: i64, seat_count: i64, commission_rate_bps: i64) -> Settlement {
    let gross_cents = price_cents.saturating_mul(seat_count.max(0)).max(0);
    let commission_cents = gross_cents
        .saturating_mul(commission_rate_bps.clamp(0, BPS_DENOMINATOR))
        / BPS_DENOMINATOR;

    Settlement {
        gross_cents,
        commission_cents,
        payout_cents: gross_cents - commission_cents,
    }
}

/// Guard a refund request against the recorded paid balance.
///
/// # Errors
///
/// Returns [`Error::OverRefund`] when the request exceeds the balance.
pub const fn validate_refund(requested_cents: i64, paid_cents: i64) -> Result<()> {
    if requested_cents > paid_cents {
        return Err(Error::OverRefund {
            requested_cents,
            paid_cents,
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn commission_splits_gross() {
        // 2 seats at 45.00, 10% commission.
        let s = settle(4_500, 2, 1_000);
        assert_eq!(s.gross_cents, 9_000);
        assert_eq!(s.commission_cents, 900);
        assert_eq!(s.payout_cents, 8_100);
    }

    #[test]
    fn commission_floors_fractional_cents() {
        // 3 seats at 3.33, 2.5% commission: 999 * 250 / 10000 = 24.975.
        let s = settle(333, 3, 250);
        assert_eq!(s.gross_cents, 999);
        assert_eq!(s.commission_cents, 24);
        assert_eq!(s.payout_cents, 975);
    }

    #[test]
    fn zero_commission_pays_out_everything() {
        let s = settle(5_000, 1, 0);
        assert_eq!(s.commission_cents, 0);
        assert_eq!(s.payout_cents, 5_000);
    }

    #[test]
    fn refund_guard() {
        assert!(validate_refund(900, 900).is_ok());
        assert!(validate_refund(0, 900).is_ok());
        let err = validate_refund(901, 900).unwrap_err();
        assert!(matches!(err, Error::OverRefund { .. }));
    }
}
