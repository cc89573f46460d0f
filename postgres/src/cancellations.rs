//! Cancellation repository.
//!
//! One append-only row per cancelled booking; the unique constraint on
//! `booking_id` makes a racing duplicate insert collapse into the
//! existing row.

use chrono::{DateTime, Utc};
use seatline_core::{BookingId, CancelActor, Error, Result};
use sqlx::{PgPool, Row};

/// A row in `cancellations`.
#[derive(Debug, Clone)]
pub struct CancellationRow {
    /// Cancellation id.
    pub id: i64,
    /// The cancelled booking.
    pub booking_id: BookingId,
    /// Who cancelled.
    pub actor: String,
    /// Optional reason.
    pub reason: Option<String>,
    /// Refund requested, in cents.
    pub refund_cents: Option<i64>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

fn row_to_cancellation(row: &sqlx::postgres::PgRow) -> CancellationRow {
    CancellationRow {
        id: row.get("id"),
        booking_id: BookingId::new(row.get("booking_id")),
        actor: row.get("actor"),
        reason: row.get("reason"),
        refund_cents: row.get("refund_cents"),
        created_at: row.get("created_at"),
    }
}

/// Record a cancellation; idempotent on `booking_id`.
///
/// Returns the existing row when the booking was already cancelled (the
/// first writer wins; later writers read back its record).
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure.
pub async fn record(
    pool: &PgPool,
    booking_id: BookingId,
    actor: CancelActor,
    reason: Option<&str>,
    refund_cents: Option<i64>,
) -> Result<CancellationRow> {
    let inserted = sqlx::query(
        r"
        INSERT INTO cancellations (booking_id, actor, reason, refund_cents)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (booking_id) DO NOTHING
        RETURNING id, booking_id, actor, reason, refund_cents, created_at
        ",
    )
    .bind(booking_id.get())
    .bind(actor.as_str())
    .bind(reason)
    .bind(refund_cents)
    .fetch_optional(pool)
    .await
    .map_err(Error::database)?;

    if let Some(row) = inserted {
        return Ok(row_to_cancellation(&row));
    }

    find_by_booking(pool, booking_id)
        .await?
        .ok_or_else(|| Error::Database("cancellation row vanished after conflict".into()))
}

/// Find the cancellation for a booking.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure.
pub async fn find_by_booking(
    pool: &PgPool,
    booking_id: BookingId,
) -> Result<Option<CancellationRow>> {
    let row = sqlx::query(
        r"SELECT id, booking_id, actor, reason, refund_cents, created_at
          FROM cancellations WHERE booking_id = $1",
    )
    .bind(booking_id.get())
    .fetch_optional(pool)
    .await
    .map_err(Error::database)?;

    Ok(row.as_ref().map(row_to_cancellation))
}
