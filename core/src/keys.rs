//! Key formats for the lock store.
//!
//! Every key the system writes to the lock store is built here so the
//! formats stay consistent between acquisition, release and
//! reconciliation.

use chrono::NaiveDate;

use crate::types::{BookingId, RouteId, TripId};

/// Ownership key for one seat on one trip: `lock:trip:{trip}:seat:{seat}`.
#[must_use]
pub fn seat_lock(trip_id: TripId, seat_number: i32) -> String {
    format!("lock:trip:{trip_id}:seat:{seat_number}")
}

/// Per-booking cancellation guard: `lock:booking:{id}:cancel`.
#[must_use]
pub fn cancel_lock(booking_id: BookingId) -> String {
    format!("lock:booking:{booking_id}:cancel")
}

/// One-time replay nonce, scoped per intake surface.
#[must_use]
pub fn nonce(scope: &str, value: &str) -> String {
    format!("nonce:{scope}:{value}")
}

/// Blocked-seat cache set for a route on a given travel date.
#[must_use]
pub fn blocked_seats(route_id: RouteId, trip_date: NaiveDate) -> String {
    format!("blocked:route:{route_id}:date:{trip_date}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn key_formats() {
        assert_eq!(seat_lock(TripId::new(12), 3), "lock:trip:12:seat:3");
        assert_eq!(cancel_lock(BookingId::new(9)), "lock:booking:9:cancel");
        assert_eq!(nonce("payment", "abc"), "nonce:payment:abc");
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(
            blocked_seats(RouteId::new(4), date),
            "blocked:route:4:date:2024-06-01"
        );
    }
}
