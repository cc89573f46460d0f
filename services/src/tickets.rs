//! Confirm-with-ticket coordinator.
//!
//! An approved operator confirms their most recent active hold by sending
//! the ticket (image or document) through the chat platform. The
//! attachment row is written first, then the hold confirms through the
//! state machine with the standard release hook.

use chrono::Utc;
use seatline_core::{Error, Result};
use seatline_postgres::attachments;
use seatline_postgres::bookings::{self, TransitionPatch};
use seatline_postgres::operators::OperatorRow;
use serde::{Deserialize, Serialize};

use crate::views::BookingView;
use crate::BookingServices;

/// A ticket received from an operator.
#[derive(Debug, Clone)]
pub struct TicketRequest {
    /// Provider media id of the attachment.
    pub provider_media_id: String,
    /// `image` or `document`.
    pub media_kind: String,
}

/// Outcome of a ticket confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketConfirmResponse {
    /// The confirmed booking.
    pub booking: BookingView,
    /// Id of the stored attachment.
    pub attachment_id: i64,
}

impl BookingServices {
    /// Confirm the operator's most recent active hold with a ticket.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] when the operator has no active hold;
    /// [`Error::DisallowedTransition`] when the hold was confirmed,
    /// cancelled or expired in the meantime; retryable infra errors
    /// otherwise.
    pub async fn confirm_with_ticket(
        &self,
        operator: &OperatorRow,
        ticket: &TicketRequest,
    ) -> Result<TicketConfirmResponse> {
        let now = Utc::now();
        let booking = bookings::latest_active_hold_for_operator(&self.pool, operator.id, now)
            .await?
            .ok_or_else(|| Error::Validation("operator has no active hold to confirm".into()))?;

        let attachment = attachments::insert(
            &self.pool,
            booking.id,
            &ticket.provider_media_id,
            &ticket.media_kind,
        )
        .await?;

        let updated = self
            .transition_with_release(
                &booking,
                seatline_core::BookingStatus::Confirmed,
                TransitionPatch::Ticket {
                    attachment_id: attachment.id,
                    received_at: attachment.received_at,
                },
            )
            .await?;

        tracing::info!(
            booking_id = %updated.id,
            operator_id = %operator.id,
            attachment_id = %attachment.id,
            "booking confirmed via operator ticket"
        );

        Ok(TicketConfirmResponse {
            booking: BookingView::from(&updated),
            attachment_id: attachment.id.get(),
        })
    }
}
