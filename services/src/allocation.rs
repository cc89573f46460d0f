//! Seat allocation: candidate planning and lock acquisition.
//!
//! Planning is pure and deterministic: seats are proposed in ascending
//! numeric order, skipping blocked ones, so two replicas given the same
//! inputs race for the same seats and the lock store's atomic `SET NX`
//! picks exactly one winner per seat.

use std::collections::HashSet;
use std::time::Duration;

use seatline_core::{keys, Result, SessionId, TripId};
use seatline_locks::AcquireOutcome;

use crate::BookingServices;

/// Seats eligible for allocation, ascending, excluding blocked ones.
#[must_use]
pub fn candidate_seats(seat_quota: i32, blocked: &HashSet<i32>) -> Vec<i32> {
    (1..=seat_quota.max(0))
        .filter(|seat| !blocked.contains(seat))
        .collect()
}

/// A successful allocation: the seats and the exact lock keys held.
#[derive(Debug, Clone)]
pub struct AcquiredSeats {
    /// Assigned seat numbers, ascending.
    pub seat_numbers: Vec<i32>,
    /// Lock keys now owned by the session.
    pub lock_keys: Vec<String>,
}

impl BookingServices {
    /// Try to lock `seat_count` seats on the trip for `session`.
    ///
    /// Walks the candidates in order; contended seats are skipped. When
    /// fewer than `seat_count` locks could be taken, every partial lock
    /// is released and `None` is returned. An infrastructure failure
    /// mid-walk also rolls back before propagating.
    ///
    /// # Errors
    ///
    /// Retryable lock-store errors.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) async fn acquire_seats(
        &self,
        trip_id: TripId,
        seat_quota: i32,
        blocked: &HashSet<i32>,
        seat_count: u32,
        session: &SessionId,
        ttl: Duration,
    ) -> Result<Option<AcquiredSeats>> {
        let mut seat_numbers = Vec::with_capacity(seat_count as usize);
        let mut lock_keys = Vec::with_capacity(seat_count as usize);

        for seat in candidate_seats(seat_quota, blocked) {
            if seat_numbers.len() as u32 == seat_count {
                break;
            }

            let key = keys::seat_lock(trip_id, seat);
            let outcome = match self.locks.acquire(&key, session.as_str(), ttl).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    self.rollback_locks(&lock_keys, session).await;
                    return Err(err);
                },
            };

            match outcome {
                AcquireOutcome::Acquired | AcquireOutcome::AlreadyOwned => {
                    seat_numbers.push(seat);
                    lock_keys.push(key);
                },
                AcquireOutcome::LockedByOther => {},
            }
        }

        if seat_numbers.len() as u32 == seat_count {
            Ok(Some(AcquiredSeats {
                seat_numbers,
                lock_keys,
            }))
        } else {
            self.rollback_locks(&lock_keys, session).await;
            Ok(None)
        }
    }

    /// Best-effort release of partially acquired locks.
    ///
    /// Failures are logged, not propagated: the locks carry a TTL and the
    /// reconciliation loop sweeps up anything left behind.
    pub(crate) async fn rollback_locks(&self, lock_keys: &[String], session: &SessionId) {
        for key in lock_keys {
            if let Err(err) = self.locks.release(key, session.as_str()).await {
                tracing::warn!(key, error = %err, "failed to roll back partial seat lock");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn candidates_ascend_and_skip_blocked() {
        let blocked: HashSet<i32> = [2, 4].into_iter().collect();
        assert_eq!(candidate_seats(5, &blocked), vec![1, 3, 5]);
    }

    #[test]
    fn zero_quota_has_no_candidates() {
        assert!(candidate_seats(0, &HashSet::new()).is_empty());
        assert!(candidate_seats(-3, &HashSet::new()).is_empty());
    }

    proptest! {
        /// The proposal order is always ascending integers, regardless of
        /// the blocked set.
        #[test]
        fn candidates_are_strictly_ascending(
            quota in 0i32..200,
            blocked in proptest::collection::hash_set(1i32..200, 0..50),
        ) {
            let seats = candidate_seats(quota, &blocked);
            prop_assert!(seats.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(seats.iter().all(|s| *s >= 1 && *s <= quota));
            prop_assert!(seats.iter().all(|s| !blocked.contains(s)));
        }

        /// Planning is a pure function: same inputs, same proposal.
        #[test]
        fn candidates_are_deterministic(
            quota in 0i32..100,
            blocked in proptest::collection::hash_set(1i32..100, 0..30),
        ) {
            prop_assert_eq!(
                candidate_seats(quota, &blocked),
                candidate_seats(quota, &blocked)
            );
        }
    }
}
