//! Ticket attachment repository.

use chrono::{DateTime, Utc};
use seatline_core::{AttachmentId, BookingId, Error, Result};
use sqlx::{PgPool, Row};

/// A row in `ticket_attachments`.
#[derive(Debug, Clone)]
pub struct AttachmentRow {
    /// Attachment id.
    pub id: AttachmentId,
    /// Booking the ticket belongs to.
    pub booking_id: BookingId,
    /// Media id at the chat provider.
    pub provider_media_id: String,
    /// `image` or `document`.
    pub media_kind: String,
    /// When the ticket arrived.
    pub received_at: DateTime<Utc>,
}

/// Store a ticket attachment for a booking.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure.
pub async fn insert(
    pool: &PgPool,
    booking_id: BookingId,
    provider_media_id: &str,
    media_kind: &str,
) -> Result<AttachmentRow> {
    let row = sqlx::query(
        r"
        INSERT INTO ticket_attachments (booking_id, provider_media_id, media_kind)
        VALUES ($1, $2, $3)
        RETURNING id, booking_id, provider_media_id, media_kind, received_at
        ",
    )
    .bind(booking_id.get())
    .bind(provider_media_id)
    .bind(media_kind)
    .fetch_one(pool)
    .await
    .map_err(Error::database)?;

    Ok(AttachmentRow {
        id: AttachmentId::new(row.get("id")),
        booking_id: BookingId::new(row.get("booking_id")),
        provider_media_id: row.get("provider_media_id"),
        media_kind: row.get("media_kind"),
        received_at: row.get("received_at"),
    })
}
