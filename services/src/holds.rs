//! Hold creation coordinator.
//!
//! Invariant: no booking row in HOLD exists without its seat locks held
//! in the lock store at commit time. Locks are acquired first; any
//! failure after acquisition (validation, insert error) releases every
//! acquired lock before returning.

use std::collections::HashSet;

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveTime, Utc};
use seatline_core::{Error, Phone, Result, SessionId, TripId};
use seatline_postgres::bookings::{self, NewHold};
use seatline_postgres::{overrides, trips};

use crate::views::BookingView;
use crate::BookingServices;

/// A validated request to hold seats on a trip.
#[derive(Debug, Clone)]
pub struct HoldRequest {
    /// Trip to book.
    pub trip_id: TripId,
    /// Travel date the caller believes the trip runs on.
    pub journey_date: NaiveDate,
    /// Departure time the caller believes the trip has.
    pub departure_time: NaiveTime,
    /// Customer phone.
    pub customer_phone: Phone,
    /// Optional customer name.
    pub customer_name: Option<String>,
    /// Seats wanted.
    pub seat_count: u32,
    /// Owner token for the seat locks.
    pub session_id: SessionId,
}

impl BookingServices {
    /// Create a HOLD booking with its seat locks.
    ///
    /// # Errors
    ///
    /// [`Error::TripNotFound`] when the trip is missing or its schedule
    /// does not match; [`Error::SeatsUnavailable`] when the quota or the
    /// lock race leaves too few seats; retryable infra errors otherwise.
    pub async fn create_hold(&self, req: &HoldRequest) -> Result<BookingView> {
        if req.seat_count == 0 {
            return Err(Error::Validation("seat_count must be at least 1".into()));
        }

        let trip = trips::find_by_id(&self.pool, req.trip_id)
            .await?
            .ok_or(Error::TripNotFound)?;

        // The caller echoes the schedule it showed the customer; a
        // mismatch means the trip was rescheduled under them.
        if trip.journey_date != req.journey_date || trip.departure_time != req.departure_time {
            return Err(Error::TripNotFound);
        }

        let available = self.availability(&trip).await?;
        if i64::from(req.seat_count) > available {
            return Err(Error::SeatsUnavailable {
                requested: req.seat_count,
                available: u32::try_from(available.max(0)).unwrap_or(0),
            });
        }

        // Seats out of reach for a new hold: override-blocked ones and
        // seats already sold (confirmed bookings hold no locks anymore).
        let mut unavailable: HashSet<i32> =
            overrides::blocked_seats(&self.pool, trip.route_id, trip.journey_date)
                .await?
                .into_iter()
                .collect();
        unavailable.extend(bookings::confirmed_seats_on_trip(&self.pool, trip.id).await?);

        let Some(acquired) = self
            .acquire_seats(
                trip.id,
                trip.seat_quota,
                &unavailable,
                req.seat_count,
                &req.session_id,
                self.seat_lock_ttl(),
            )
            .await?
        else {
            // Lost the race between the availability read and the lock
            // walk; report what is left now.
            let available = self.availability(&trip).await.unwrap_or(0);
            return Err(Error::SeatsUnavailable {
                requested: req.seat_count,
                available: u32::try_from(available.max(0)).unwrap_or(0),
            });
        };

        let hold_expires_at = Utc::now()
            + ChronoDuration::from_std(self.config.hold_duration)
                .map_err(|e| Error::Validation(e.to_string()))?;

        let hold = NewHold {
            trip_id: trip.id,
            customer_phone: req.customer_phone.as_str().to_string(),
            customer_name: req.customer_name.clone(),
            seat_numbers: acquired.seat_numbers.clone(),
            lock_keys: acquired.lock_keys.clone(),
            session_id: req.session_id.as_str().to_string(),
            hold_expires_at,
        };

        let booking = match bookings::insert_hold(&self.pool, &hold).await {
            Ok(row) => row,
            Err(err) => {
                // The insert failed after we took the locks; release them
                // or the seats would stay dead until lock TTL.
                self.rollback_locks(&acquired.lock_keys, &req.session_id)
                    .await;
                return Err(err);
            },
        };

        tracing::info!(
            booking_id = %booking.id,
            trip_id = %trip.id,
            seats = ?booking.seat_numbers,
            session_id = %req.session_id,
            hold_expires_at = %hold_expires_at,
            "hold created"
        );

        Ok(BookingView::from(&booking))
    }
}
