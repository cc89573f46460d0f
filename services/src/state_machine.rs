//! Booking state machine executor.
//!
//! The transition table itself lives in `seatline_core::BookingStatus`;
//! this module is the only code that flips `bookings.status`. The order
//! is fixed: the inventory-release hook runs **before** the status flip,
//! so a failed release aborts the transition and the booking stays in
//! HOLD with its locks intact. The flip is a guarded update; a racing
//! transition loses with `DISALLOWED_TRANSITION`.

use seatline_core::{BookingStatus, Error, Result};
use seatline_locks::ReleaseOutcome;
use seatline_postgres::bookings::{self, BookingRow, TransitionPatch};

use crate::BookingServices;

impl BookingServices {
    /// Transition a booking, releasing its recorded seat locks first.
    ///
    /// `HOLD -> HOLD` is a no-op that returns the row unchanged. For
    /// every other transition the release hook runs over the booking's
    /// `lock_keys` with its recorded session id as owner; locks that are
    /// already gone are fine (a CONFIRMED booking released its locks at
    /// confirmation time).
    ///
    /// # Errors
    ///
    /// [`Error::DisallowedTransition`] when the table forbids the move or
    /// a concurrent transition won the guarded update; retryable lock or
    /// database errors abort before the flip.
    pub(crate) async fn transition_with_release(
        &self,
        booking: &BookingRow,
        to: BookingStatus,
        patch: TransitionPatch,
    ) -> Result<BookingRow> {
        if !booking.status.can_transition_to(to) {
            return Err(Error::DisallowedTransition {
                from: booking.status,
                to,
            });
        }

        if booking.status == BookingStatus::Hold && to == BookingStatus::Hold {
            return Ok(booking.clone());
        }

        self.release_recorded_locks(booking).await?;

        let updated =
            bookings::transition_status(&self.pool, booking.id, booking.status, to, &patch)
                .await?;

        updated.ok_or(Error::DisallowedTransition {
            from: booking.status,
            to,
        })
    }

    /// Release every lock key recorded on the booking, owner-checked.
    ///
    /// `NotFound` per key is expected on post-confirmation paths.
    /// `NotOwner` means the key was re-acquired by a newer session after
    /// our hold lapsed; releasing someone else's lock would be wrong, so
    /// it is left alone.
    async fn release_recorded_locks(&self, booking: &BookingRow) -> Result<()> {
        let mut released = 0u32;

        for key in &booking.lock_keys {
            match self.locks.release(key, &booking.session_id).await? {
                ReleaseOutcome::Released => released += 1,
                ReleaseOutcome::NotFound => {},
                ReleaseOutcome::NotOwner => {
                    tracing::warn!(
                        booking_id = %booking.id,
                        key,
                        "seat lock owned by a different session at release time"
                    );
                },
            }
        }

        // A confirmed booking should have released everything when it
        // confirmed; live locks here point at a missed release upstream.
        if booking.status == BookingStatus::Confirmed && released > 0 {
            tracing::warn!(
                booking_id = %booking.id,
                released,
                "seat locks were still held for a CONFIRMED booking"
            );
        }

        Ok(())
    }
}
