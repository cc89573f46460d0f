//! Availability accounting.
//!
//! `availability = seat_quota - confirmed - active_holds - blocked`,
//! floored at zero. An "active hold" is a HOLD whose deadline is still in
//! the future; a hold past its deadline stops counting immediately even
//! though the reconciliation loop transitions it later (lazy expiry).

use chrono::Utc;
use seatline_core::Result;
use seatline_postgres::{bookings, overrides, trips::TripRow};

use crate::BookingServices;

/// The availability arithmetic, floored at zero.
#[must_use]
pub const fn compute_availability(
    seat_quota: i64,
    confirmed: i64,
    active_holds: i64,
    blocked: i64,
) -> i64 {
    let free = seat_quota - confirmed - active_holds - blocked;
    if free < 0 { 0 } else { free }
}

impl BookingServices {
    /// Current number of seats a new hold could take on the trip.
    ///
    /// Blocked seats come from the Redis mirror (refreshed on every
    /// block/unblock) so this stays cheap on the hot path, with the
    /// override table as fallback when the mirror is unreachable.
    ///
    /// # Errors
    ///
    /// Retryable database errors.
    #[allow(clippy::cast_possible_wrap)]
    pub async fn availability(&self, trip: &TripRow) -> Result<i64> {
        let now = Utc::now();
        let confirmed = bookings::confirmed_seat_count(&self.pool, trip.id).await?;
        let active_holds = bookings::active_hold_seat_count(&self.pool, trip.id, now).await?;
        let blocked = self.blocked_seats_cached(trip).await?;

        Ok(compute_availability(
            i64::from(trip.seat_quota),
            confirmed,
            active_holds,
            blocked.len() as i64,
        ))
    }

    /// Blocked seats from the Redis mirror, falling back to the override
    /// table when the mirror is unreachable.
    ///
    /// # Errors
    ///
    /// Retryable database errors (only when both reads fail).
    pub async fn blocked_seats_cached(&self, trip: &TripRow) -> Result<Vec<i32>> {
        match self
            .blocked_cache
            .fetch(trip.route_id, trip.journey_date)
            .await
        {
            Ok(seats) => Ok(seats),
            Err(err) => {
                tracing::warn!(error = %err, "blocked-seat cache unreachable, reading table");
                overrides::blocked_seats(&self.pool, trip.route_id, trip.journey_date).await
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn availability_subtracts_all_three() {
        assert_eq!(compute_availability(40, 10, 5, 3), 22);
    }

    #[test]
    fn availability_never_negative() {
        assert_eq!(compute_availability(10, 8, 4, 2), 0);
        assert_eq!(compute_availability(0, 0, 0, 5), 0);
    }

    proptest! {
        #[test]
        fn floor_holds_for_all_inputs(
            quota in 0i64..1000,
            confirmed in 0i64..1000,
            holds in 0i64..1000,
            blocked in 0i64..1000,
        ) {
            let free = compute_availability(quota, confirmed, holds, blocked);
            prop_assert!(free >= 0);
            prop_assert!(free <= quota);
        }
    }
}
