//! Cancellation coordinator.
//!
//! Ownership rules: admin always; a customer must present the booking's
//! normalized phone; an operator must own the booking's route. The
//! critical section re-reads the booking under a short-TTL per-booking
//! lock so a customer and an operator cancelling concurrently serialize
//! instead of double-writing.

use chrono::Utc;
use seatline_core::{
    keys, BookingId, BookingStatus, CancelActor, Error, OperatorId, Phone, Result,
};
use seatline_locks::AcquireOutcome;
use seatline_postgres::audit::{self, DomainEvent};
use seatline_postgres::bookings::{self, BookingRow, TransitionPatch};
use seatline_postgres::{cancellations, operators, routes, trips};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::settlement;
use crate::views::{BookingView, CancellationView};
use crate::BookingServices;

/// Identity presented by the cancelling actor.
#[derive(Debug, Clone)]
pub enum CancelIdentity {
    /// Administrator; always allowed.
    Admin,
    /// Customer; must match the booking's phone.
    Customer {
        /// Phone presented by the customer.
        phone: Phone,
    },
    /// Operator; must own the booking's route.
    Operator {
        /// Operator id, when supplied directly.
        operator_id: Option<OperatorId>,
        /// Operator phone, when the id is not known.
        operator_phone: Option<Phone>,
    },
}

impl CancelIdentity {
    const fn actor(&self) -> CancelActor {
        match self {
            Self::Admin => CancelActor::Admin,
            Self::Customer { .. } => CancelActor::Customer,
            Self::Operator { .. } => CancelActor::Operator,
        }
    }
}

/// A cancellation request that already passed surface authentication.
#[derive(Debug, Clone)]
pub struct CancelRequest {
    /// Booking to cancel.
    pub booking_id: BookingId,
    /// Who is cancelling.
    pub identity: CancelIdentity,
    /// Optional free-form reason.
    pub reason: Option<String>,
    /// The intake idempotency key, reused for audit attribution.
    pub idempotency_key: String,
}

/// Outcome of a cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    /// The booking after the operation.
    pub booking: BookingView,
    /// The cancellation record.
    pub cancellation: CancellationView,
    /// True when the booking was already cancelled.
    pub idempotent: bool,
}

impl BookingServices {
    /// Cancel a CONFIRMED booking.
    ///
    /// # Errors
    ///
    /// [`Error::BookingNotFound`], [`Error::BookingOwnershipInvalid`],
    /// [`Error::BookingLocked`] while another cancel holds the guard,
    /// [`Error::BookingNotConfirmed`] for holds and expired bookings;
    /// retryable infra errors otherwise.
    pub async fn cancel_booking(&self, req: &CancelRequest) -> Result<CancelResponse> {
        let booking = bookings::find_by_id(&self.pool, req.booking_id)
            .await?
            .ok_or(Error::BookingNotFound(req.booking_id))?;

        self.check_cancel_ownership(&booking, &req.identity).await?;

        // Per-booking guard: fresh owner token per attempt, so a crashed
        // canceller only blocks others until the TTL lapses.
        let guard_key = keys::cancel_lock(booking.id);
        let guard_owner = format!("cancel_{}", Uuid::new_v4());
        match self
            .locks
            .acquire(&guard_key, &guard_owner, self.config.cancel_lock_ttl)
            .await?
        {
            AcquireOutcome::Acquired | AcquireOutcome::AlreadyOwned => {},
            AcquireOutcome::LockedByOther => return Err(Error::BookingLocked),
        }

        let result = self.cancel_in_critical_section(req, booking.id).await;

        // Best-effort guard release; the TTL covers a failure here.
        if let Err(err) = self.locks.release(&guard_key, &guard_owner).await {
            tracing::warn!(booking_id = %booking.id, error = %err, "failed to release cancel guard");
        }

        result
    }

    async fn cancel_in_critical_section(
        &self,
        req: &CancelRequest,
        booking_id: BookingId,
    ) -> Result<CancelResponse> {
        // Re-read inside the guard: the first read raced other writers.
        let booking = bookings::find_by_id(&self.pool, booking_id)
            .await?
            .ok_or(Error::BookingNotFound(booking_id))?;

        if booking.status == BookingStatus::Cancelled {
            let cancellation = cancellations::find_by_booking(&self.pool, booking.id)
                .await?
                .ok_or_else(|| {
                    Error::Database("cancelled booking has no cancellation row".into())
                })?;
            return Ok(CancelResponse {
                booking: BookingView::from(&booking),
                cancellation: CancellationView::from(&cancellation),
                idempotent: true,
            });
        }

        if booking.status != BookingStatus::Confirmed {
            return Err(Error::BookingNotConfirmed {
                status: booking.status,
            });
        }

        let actor = req.identity.actor();
        let refund_cents = self.refundable_balance(&booking).await?;

        let updated = self
            .transition_with_release(
                &booking,
                BookingStatus::Cancelled,
                TransitionPatch::Cancellation {
                    actor,
                    reason: req.reason.clone(),
                    at: Utc::now(),
                },
            )
            .await?;

        let cancellation = cancellations::record(
            &self.pool,
            updated.id,
            actor,
            req.reason.as_deref(),
            Some(refund_cents),
        )
        .await?;

        audit::append(
            &self.pool,
            &DomainEvent {
                source: "booking",
                event_type: "booking_cancelled",
                idempotency_key: req.idempotency_key.clone(),
                payload: json!({
                    "booking_id": updated.id.get(),
                    "actor": actor.as_str(),
                    "reason": req.reason,
                }),
                session_id: Some(&updated.session_id),
                operator_id: None,
            },
        )
        .await?;

        audit::append(
            &self.pool,
            &DomainEvent {
                source: "booking",
                event_type: "refund_requested",
                idempotency_key: req.idempotency_key.clone(),
                payload: json!({
                    "booking_id": updated.id.get(),
                    "refund_cents": refund_cents,
                }),
                session_id: Some(&updated.session_id),
                operator_id: None,
            },
        )
        .await?;

        tracing::info!(
            booking_id = %updated.id,
            actor = %actor,
            refund_cents,
            "booking cancelled"
        );

        Ok(CancelResponse {
            booking: BookingView::from(&updated),
            cancellation: CancellationView::from(&cancellation),
            idempotent: false,
        })
    }

    async fn check_cancel_ownership(
        &self,
        booking: &BookingRow,
        identity: &CancelIdentity,
    ) -> Result<()> {
        match identity {
            CancelIdentity::Admin => Ok(()),
            CancelIdentity::Customer { phone } => {
                let booking_phone = Phone::normalize(&booking.customer_phone)?;
                if booking_phone == *phone {
                    Ok(())
                } else {
                    Err(Error::BookingOwnershipInvalid)
                }
            },
            CancelIdentity::Operator {
                operator_id,
                operator_phone,
            } => {
                let operator_id = match (operator_id, operator_phone) {
                    (Some(id), _) => *id,
                    (None, Some(phone)) => operators::find_by_phone(&self.pool, phone)
                        .await?
                        .ok_or(Error::BookingOwnershipInvalid)?
                        .id,
                    (None, None) => return Err(Error::BookingOwnershipInvalid),
                };

                let trip = trips::find_by_id(&self.pool, booking.trip_id)
                    .await?
                    .ok_or(Error::TripNotFound)?;

                if operators::owns_route(&self.pool, operator_id, trip.route_id).await? {
                    Ok(())
                } else {
                    Err(Error::BookingOwnershipInvalid)
                }
            },
        }
    }

    /// The balance a cancellation may request back: the gross paid at
    /// confirmation time, capped by the settlement guard.
    async fn refundable_balance(&self, booking: &BookingRow) -> Result<i64> {
        let trip = trips::find_by_id(&self.pool, booking.trip_id)
            .await?
            .ok_or(Error::TripNotFound)?;
        let route = routes::find_by_id(&self.pool, trip.route_id)
            .await?
            .ok_or(Error::TripNotFound)?;

        let paid = settlement::settle(
            route.price_cents,
            i64::from(booking.seat_count),
            self.config.commission_rate_bps,
        )
        .gross_cents;

        settlement::validate_refund(paid, paid)?;
        Ok(paid)
    }
}
