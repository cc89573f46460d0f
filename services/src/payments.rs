//! Payment-apply coordinator.
//!
//! Maps a verified payment-gateway event onto the held booking: success
//! confirms, failure or abandonment expires. A booking that is no longer
//! in HOLD yields idempotent success; the ledger short-circuits exact
//! duplicates before this code even runs.

use seatline_core::{BookingId, BookingStatus, Error, PaymentOutcome, Result};
use seatline_postgres::audit::{self, DomainEvent};
use seatline_postgres::bookings::{self, TransitionPatch};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::views::BookingView;
use crate::BookingServices;

/// A verified payment event.
#[derive(Debug, Clone)]
pub struct PaymentApplyRequest {
    /// Gateway's unique event id (the idempotency key).
    pub gateway_event_id: String,
    /// Raw gateway status string.
    pub status: String,
    /// Booking referenced by the event metadata.
    pub booking_id: BookingId,
}

/// Outcome returned to the gateway (and stored in the ledger).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentApplyResponse {
    /// Always true for handled events.
    pub success: bool,
    /// The booking the event applied to.
    pub booking: BookingView,
    /// Whether the event found the booking already in a terminal state.
    pub idempotent: bool,
}

impl BookingServices {
    /// Apply a payment event to its booking.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for an unknown gateway status,
    /// [`Error::BookingNotFound`] when the metadata points nowhere;
    /// retryable infra errors otherwise.
    pub async fn apply_payment(&self, req: &PaymentApplyRequest) -> Result<PaymentApplyResponse> {
        let outcome = PaymentOutcome::from_gateway(&req.status).ok_or_else(|| {
            Error::Validation(format!("unknown gateway status: {}", req.status))
        })?;

        let booking = bookings::find_by_id(&self.pool, req.booking_id)
            .await?
            .ok_or(Error::BookingNotFound(req.booking_id))?;

        if booking.status != BookingStatus::Hold {
            tracing::info!(
                booking_id = %booking.id,
                status = %booking.status,
                gateway_event_id = %req.gateway_event_id,
                "payment event for non-held booking, idempotent success"
            );
            return Ok(PaymentApplyResponse {
                success: true,
                booking: BookingView::from(&booking),
                idempotent: true,
            });
        }

        let target = outcome.target_status();
        let updated = match self
            .transition_with_release(&booking, target, TransitionPatch::None)
            .await
        {
            Ok(row) => row,
            Err(Error::DisallowedTransition { .. }) => {
                // A racing cancel/expiry/confirm flipped the booking
                // between our read and the guarded update; observe the
                // winner and report idempotent success.
                let current = bookings::find_by_id(&self.pool, req.booking_id)
                    .await?
                    .ok_or(Error::BookingNotFound(req.booking_id))?;
                return Ok(PaymentApplyResponse {
                    success: true,
                    booking: BookingView::from(&current),
                    idempotent: true,
                });
            },
            Err(err) => return Err(err),
        };

        if target == BookingStatus::Expired {
            audit::append(
                &self.pool,
                &DomainEvent {
                    source: "payment",
                    event_type: "inventory_released",
                    idempotency_key: req.gateway_event_id.clone(),
                    payload: json!({
                        "booking_id": updated.id.get(),
                        "gateway_status": req.status,
                        "seat_numbers": updated.seat_numbers,
                    }),
                    session_id: Some(&updated.session_id),
                    operator_id: None,
                },
            )
            .await?;
        }

        tracing::info!(
            booking_id = %updated.id,
            gateway_event_id = %req.gateway_event_id,
            status = %updated.status,
            "payment event applied"
        );

        Ok(PaymentApplyResponse {
            success: true,
            booking: BookingView::from(&updated),
            idempotent: false,
        })
    }
}
