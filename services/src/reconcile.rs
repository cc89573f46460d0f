//! Reconciliation: hold expiry and orphaned-lock reconvergence.
//!
//! Two independent passes:
//!
//! - [`BookingServices::expire_due_holds`] runs frequently and expires
//!   every hold past its deadline, releasing the recorded locks.
//! - [`BookingServices::reconcile_orphaned_holds`] runs after a
//!   lock-store restart (and periodically as a safety net): a hold none
//!   of whose lock keys survive in the store has lost its seats to the
//!   crash and is force-expired. A hold with at least one surviving key
//!   is respected.
//!
//! This is the only mechanism that resolves the "database says HOLD, lock
//! store says free" skew. A hold that confirms between selection and
//! update loses the guarded flip with `DISALLOWED_TRANSITION` and is
//! simply skipped.

use chrono::{DateTime, Utc};
use seatline_core::{BookingStatus, Error, Result};
use seatline_postgres::audit::{self, DomainEvent};
use seatline_postgres::bookings::{self, BookingRow, TransitionPatch};
use serde::Serialize;
use serde_json::json;

use crate::BookingServices;

/// Counters from a reconciliation pass.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ReconcileReport {
    /// Holds transitioned to EXPIRED.
    pub expired: u32,
    /// Holds skipped because a racing transition won.
    pub skipped: u32,
    /// Holds left alone (orphan pass only: at least one lock survived).
    pub respected: u32,
}

impl BookingServices {
    /// Expire every hold whose deadline has passed.
    ///
    /// # Errors
    ///
    /// Retryable database errors; per-booking failures are logged and
    /// counted, not propagated, so one stuck row cannot stall the sweep.
    pub async fn expire_due_holds(&self, now: DateTime<Utc>) -> Result<ReconcileReport> {
        let due = bookings::holds_due(&self.pool, now).await?;
        let mut report = ReconcileReport::default();

        for booking in due {
            match self
                .transition_with_release(&booking, BookingStatus::Expired, TransitionPatch::None)
                .await
            {
                Ok(expired) => {
                    report.expired += 1;
                    self.append_expiry_audit(&expired, "hold_expired").await?;
                },
                Err(Error::DisallowedTransition { from, to }) => {
                    report.skipped += 1;
                    tracing::debug!(
                        booking_id = %booking.id,
                        %from,
                        %to,
                        "hold expiry lost to a racing transition"
                    );
                },
                Err(err) => {
                    report.skipped += 1;
                    tracing::warn!(booking_id = %booking.id, error = %err, "hold expiry failed");
                },
            }
        }

        if report.expired > 0 {
            metrics::counter!("seatline.reconcile.holds_expired").increment(u64::from(report.expired));
            tracing::info!(expired = report.expired, skipped = report.skipped, "expired due holds");
        }

        Ok(report)
    }

    /// Force-expire holds whose locks vanished from the lock store.
    ///
    /// # Errors
    ///
    /// Retryable database errors when listing holds; per-booking lock
    /// probes that fail are logged and skipped.
    pub async fn reconcile_orphaned_holds(&self) -> Result<ReconcileReport> {
        let holds = bookings::all_holds(&self.pool).await?;
        self.reconcile_orphans_for(&holds).await
    }

    /// Orphan pass over an explicit set of holds.
    ///
    /// # Errors
    ///
    /// Retryable database errors.
    pub async fn reconcile_orphans_for(&self, holds: &[BookingRow]) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for booking in holds {
            let survives = match self.locks.any_exists(&booking.lock_keys).await {
                Ok(survives) => survives,
                Err(err) => {
                    tracing::warn!(
                        booking_id = %booking.id,
                        error = %err,
                        "lock probe failed, leaving hold untouched"
                    );
                    report.respected += 1;
                    continue;
                },
            };

            if survives {
                report.respected += 1;
                continue;
            }

            match self
                .transition_with_release(booking, BookingStatus::Expired, TransitionPatch::None)
                .await
            {
                Ok(expired) => {
                    report.expired += 1;
                    self.append_expiry_audit(&expired, "inventory_released").await?;
                    tracing::warn!(
                        booking_id = %expired.id,
                        session_id = %expired.session_id,
                        "hold lost its locks to a lock-store crash, force-expired"
                    );
                },
                Err(Error::DisallowedTransition { .. }) => report.skipped += 1,
                Err(err) => {
                    report.skipped += 1;
                    tracing::warn!(booking_id = %booking.id, error = %err, "orphan expiry failed");
                },
            }
        }

        if report.expired > 0 {
            metrics::counter!("seatline.reconcile.orphans_expired")
                .increment(u64::from(report.expired));
        }

        Ok(report)
    }

    async fn append_expiry_audit(&self, booking: &BookingRow, event_type: &str) -> Result<()> {
        // A booking expires at most once (EXPIRED is a sink), so its id
        // alone is a sufficient idempotency key.
        audit::append(
            &self.pool,
            &DomainEvent {
                source: "inventory",
                event_type,
                idempotency_key: booking.id.to_string(),
                payload: json!({
                    "booking_id": booking.id.get(),
                    "trip_id": booking.trip_id.get(),
                    "seat_numbers": booking.seat_numbers,
                }),
                session_id: Some(&booking.session_id),
                operator_id: None,
            },
        )
        .await?;
        Ok(())
    }
}
