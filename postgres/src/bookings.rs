//! Booking repository.
//!
//! The booking row is the system of record: it owns the seat numbers and
//! the exact lock keys held in the lock store while in HOLD. Status flips
//! only happen through [`transition_status`], whose `WHERE status = …`
//! guard makes racing transitions lose cleanly instead of clobbering each
//! other.

use chrono::{DateTime, NaiveDate, Utc};
use seatline_core::{
    AttachmentId, BookingId, BookingStatus, CancelActor, Error, OperatorId, Result, TripId,
};
use sqlx::{PgPool, Row};

/// A row in `bookings`, with the status normalized to the canonical
/// alphabet.
#[derive(Debug, Clone)]
pub struct BookingRow {
    /// Booking id.
    pub id: BookingId,
    /// Trip this booking belongs to.
    pub trip_id: TripId,
    /// Normalized customer phone.
    pub customer_phone: String,
    /// Optional customer display name.
    pub customer_name: Option<String>,
    /// Number of seats booked.
    pub seat_count: i32,
    /// Assigned seat numbers, ascending.
    pub seat_numbers: Vec<i32>,
    /// Lock keys held in the lock store while in HOLD.
    pub lock_keys: Vec<String>,
    /// Owner token of the seat locks.
    pub session_id: String,
    /// Canonical lifecycle status.
    pub status: BookingStatus,
    /// Hold deadline; present iff status is HOLD.
    pub hold_expires_at: Option<DateTime<Utc>>,
    /// Ticket attachment backing a ticket-confirmed booking.
    pub ticket_attachment_id: Option<AttachmentId>,
    /// When the ticket arrived.
    pub ticket_received_at: Option<DateTime<Utc>>,
    /// Cancellation metadata; present iff status is CANCELLED.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Actor who cancelled.
    pub cancelled_by: Option<String>,
    /// Free-form cancellation reason.
    pub cancellation_reason: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

const BOOKING_COLUMNS: &str = r"
    id, trip_id, customer_phone, customer_name, seat_count, seat_numbers,
    lock_keys, session_id, status, hold_expires_at, ticket_attachment_id,
    ticket_received_at, cancelled_at, cancelled_by, cancellation_reason,
    created_at
";

fn row_to_booking(row: &sqlx::postgres::PgRow) -> Result<BookingRow> {
    let status: String = row.get("status");
    Ok(BookingRow {
        id: BookingId::new(row.get("id")),
        trip_id: TripId::new(row.get("trip_id")),
        customer_phone: row.get("customer_phone"),
        customer_name: row.get("customer_name"),
        seat_count: row.get("seat_count"),
        seat_numbers: row.get("seat_numbers"),
        lock_keys: row.get("lock_keys"),
        session_id: row.get("session_id"),
        status: BookingStatus::parse(&status)?,
        hold_expires_at: row.get("hold_expires_at"),
        ticket_attachment_id: row
            .get::<Option<i64>, _>("ticket_attachment_id")
            .map(AttachmentId::new),
        ticket_received_at: row.get("ticket_received_at"),
        cancelled_at: row.get("cancelled_at"),
        cancelled_by: row.get("cancelled_by"),
        cancellation_reason: row.get("cancellation_reason"),
        created_at: row.get("created_at"),
    })
}

/// Stored spellings that read back as the given canonical status.
///
/// Historical rows keep their legacy strings until they next transition;
/// guarded updates must match them too or old holds would be immortal.
fn read_aliases(status: BookingStatus) -> Vec<String> {
    let aliases: &[&str] = match status {
        BookingStatus::Hold => &["HOLD", "pending", "payment_pending"],
        BookingStatus::Confirmed => &["CONFIRMED"],
        BookingStatus::Cancelled => &["CANCELLED", "rejected"],
        BookingStatus::Expired => &["EXPIRED"],
    };
    aliases.iter().map(ToString::to_string).collect()
}

/// Fields for a new hold row.
#[derive(Debug, Clone)]
pub struct NewHold {
    /// Trip being booked.
    pub trip_id: TripId,
    /// Normalized customer phone.
    pub customer_phone: String,
    /// Optional display name.
    pub customer_name: Option<String>,
    /// Assigned seat numbers (ascending, one per seat).
    pub seat_numbers: Vec<i32>,
    /// Lock keys acquired for those seats.
    pub lock_keys: Vec<String>,
    /// Owner token of the locks.
    pub session_id: String,
    /// Hold deadline.
    pub hold_expires_at: DateTime<Utc>,
}

/// Persist a new HOLD booking.
///
/// The caller must already hold the seat locks named in `lock_keys`; on
/// insert failure it must release them.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub async fn insert_hold(pool: &PgPool, hold: &NewHold) -> Result<BookingRow> {
    let row = sqlx::query(&format!(
        r"
        INSERT INTO bookings (
            trip_id, customer_phone, customer_name, seat_count, seat_numbers,
            lock_keys, session_id, status, hold_expires_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {BOOKING_COLUMNS}
        "
    ))
    .bind(hold.trip_id.get())
    .bind(&hold.customer_phone)
    .bind(hold.customer_name.as_deref())
    .bind(hold.seat_numbers.len() as i32)
    .bind(&hold.seat_numbers)
    .bind(&hold.lock_keys)
    .bind(&hold.session_id)
    .bind(BookingStatus::Hold.as_str())
    .bind(hold.hold_expires_at)
    .fetch_one(pool)
    .await
    .map_err(Error::database)?;

    metrics::counter!("seatline.bookings.holds_created").increment(1);
    row_to_booking(&row)
}

/// Find a booking by id.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure.
pub async fn find_by_id(pool: &PgPool, id: BookingId) -> Result<Option<BookingRow>> {
    let row = sqlx::query(&format!(
        r"SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
    ))
    .bind(id.get())
    .fetch_optional(pool)
    .await
    .map_err(Error::database)?;

    row.as_ref().map(row_to_booking).transpose()
}

/// Holds whose deadline has passed.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure.
pub async fn holds_due(pool: &PgPool, now: DateTime<Utc>) -> Result<Vec<BookingRow>> {
    let rows = sqlx::query(&format!(
        r"
        SELECT {BOOKING_COLUMNS} FROM bookings
        WHERE status = ANY($1) AND hold_expires_at <= $2
        ORDER BY hold_expires_at ASC
        "
    ))
    .bind(read_aliases(BookingStatus::Hold))
    .bind(now)
    .fetch_all(pool)
    .await
    .map_err(Error::database)?;

    rows.iter().map(row_to_booking).collect()
}

/// Every booking currently in HOLD, regardless of deadline.
///
/// Used by orphan reconciliation after a lock-store restart.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure.
pub async fn all_holds(pool: &PgPool) -> Result<Vec<BookingRow>> {
    let rows = sqlx::query(&format!(
        r"SELECT {BOOKING_COLUMNS} FROM bookings WHERE status = ANY($1)"
    ))
    .bind(read_aliases(BookingStatus::Hold))
    .fetch_all(pool)
    .await
    .map_err(Error::database)?;

    rows.iter().map(row_to_booking).collect()
}

/// The most recent unexpired HOLD on any trip of the operator's routes.
///
/// This is the booking an operator's ticket attachment confirms.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure.
pub async fn latest_active_hold_for_operator(
    pool: &PgPool,
    operator_id: OperatorId,
    now: DateTime<Utc>,
) -> Result<Option<BookingRow>> {
    let rows = sqlx::query(&format!(
        r"
        SELECT {BOOKING_COLUMNS} FROM bookings b
        WHERE b.status = ANY($1)
          AND b.hold_expires_at > $2
          AND b.trip_id IN (
              SELECT t.id FROM trips t
              JOIN routes r ON r.id = t.route_id
              WHERE r.operator_id = $3
          )
        ORDER BY b.created_at DESC
        LIMIT 1
        "
    ))
    .bind(read_aliases(BookingStatus::Hold))
    .bind(now)
    .bind(operator_id.get())
    .fetch_optional(pool)
    .await
    .map_err(Error::database)?;

    rows.as_ref().map(row_to_booking).transpose()
}

/// Total seats in CONFIRMED bookings on a trip.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure.
pub async fn confirmed_seat_count(pool: &PgPool, trip_id: TripId) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r"
        SELECT COALESCE(SUM(seat_count), 0)::BIGINT FROM bookings
        WHERE trip_id = $1 AND status = 'CONFIRMED'
        ",
    )
    .bind(trip_id.get())
    .fetch_one(pool)
    .await
    .map_err(Error::database)?;

    Ok(count)
}

/// Total seats in unexpired HOLD bookings on a trip.
///
/// Lazy expiry: a hold past its deadline stops counting here even before
/// the reconciliation loop transitions it.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure.
pub async fn active_hold_seat_count(
    pool: &PgPool,
    trip_id: TripId,
    now: DateTime<Utc>,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r"
        SELECT COALESCE(SUM(seat_count), 0)::BIGINT FROM bookings
        WHERE trip_id = $1 AND status = ANY($2) AND hold_expires_at > $3
        ",
    )
    .bind(trip_id.get())
    .bind(read_aliases(BookingStatus::Hold))
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(Error::database)?;

    Ok(count)
}

/// All seat numbers held by CONFIRMED bookings on a trip, ascending.
///
/// Confirmed seats no longer carry locks (released at confirmation), so
/// the allocator must exclude them explicitly.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure.
pub async fn confirmed_seats_on_trip(pool: &PgPool, trip_id: TripId) -> Result<Vec<i32>> {
    let seats: Vec<i32> = sqlx::query_scalar(
        r"
        SELECT DISTINCT seat FROM bookings b, UNNEST(b.seat_numbers) AS seat
        WHERE b.trip_id = $1 AND b.status = 'CONFIRMED'
        ORDER BY seat
        ",
    )
    .bind(trip_id.get())
    .fetch_all(pool)
    .await
    .map_err(Error::database)?;

    Ok(seats)
}

/// Seat numbers from the requested set that already belong to a CONFIRMED
/// booking on any trip of the route on the given date.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure.
pub async fn confirmed_seats_overlap(
    pool: &PgPool,
    route_id: seatline_core::RouteId,
    trip_date: NaiveDate,
    seats: &[i32],
) -> Result<Vec<i32>> {
    let rows: Vec<i32> = sqlx::query_scalar(
        r"
        SELECT DISTINCT seat FROM bookings b
        JOIN trips t ON t.id = b.trip_id,
        UNNEST(b.seat_numbers) AS seat
        WHERE t.route_id = $1
          AND t.journey_date = $2
          AND b.status = 'CONFIRMED'
          AND seat = ANY($3)
        ORDER BY seat
        ",
    )
    .bind(route_id.get())
    .bind(trip_date)
    .bind(seats)
    .fetch_all(pool)
    .await
    .map_err(Error::database)?;

    Ok(rows)
}

/// Extra columns written alongside a status flip.
#[derive(Debug, Clone)]
pub enum TransitionPatch {
    /// Status flip only.
    None,
    /// Confirmation via operator ticket.
    Ticket {
        /// The stored attachment backing the confirmation.
        attachment_id: AttachmentId,
        /// When the ticket arrived.
        received_at: DateTime<Utc>,
    },
    /// Cancellation metadata.
    Cancellation {
        /// Who cancelled.
        actor: CancelActor,
        /// Optional free-form reason.
        reason: Option<String>,
        /// Cancellation timestamp.
        at: DateTime<Utc>,
    },
}

/// Guarded status flip: succeeds only while the row still reads as
/// `from`.
///
/// `hold_expires_at` is nulled on every flip away from HOLD, keeping the
/// terminal-state invariant. Returns `None` when a concurrent transition
/// won the race (zero rows matched).
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure.
pub async fn transition_status(
    pool: &PgPool,
    id: BookingId,
    from: BookingStatus,
    to: BookingStatus,
    patch: &TransitionPatch,
) -> Result<Option<BookingRow>> {
    let aliases = read_aliases(from);

    let row = match patch {
        TransitionPatch::None => {
            sqlx::query(&format!(
                r"
                UPDATE bookings
                SET status = $3, hold_expires_at = NULL
                WHERE id = $1 AND status = ANY($2)
                RETURNING {BOOKING_COLUMNS}
                "
            ))
            .bind(id.get())
            .bind(aliases)
            .bind(to.as_str())
            .fetch_optional(pool)
            .await
        },
        TransitionPatch::Ticket {
            attachment_id,
            received_at,
        } => {
            sqlx::query(&format!(
                r"
                UPDATE bookings
                SET status = $3, hold_expires_at = NULL,
                    ticket_attachment_id = $4, ticket_received_at = $5
                WHERE id = $1 AND status = ANY($2)
                RETURNING {BOOKING_COLUMNS}
                "
            ))
            .bind(id.get())
            .bind(aliases)
            .bind(to.as_str())
            .bind(attachment_id.get())
            .bind(received_at)
            .fetch_optional(pool)
            .await
        },
        TransitionPatch::Cancellation { actor, reason, at } => {
            sqlx::query(&format!(
                r"
                UPDATE bookings
                SET status = $3, hold_expires_at = NULL,
                    cancelled_at = $4, cancelled_by = $5, cancellation_reason = $6
                WHERE id = $1 AND status = ANY($2)
                RETURNING {BOOKING_COLUMNS}
                "
            ))
            .bind(id.get())
            .bind(aliases)
            .bind(to.as_str())
            .bind(at)
            .bind(actor.as_str())
            .bind(reason.as_deref())
            .fetch_optional(pool)
            .await
        },
    }
    .map_err(Error::database)?;

    if row.is_some() {
        metrics::counter!(
            "seatline.bookings.transitions",
            "to" => to.as_str()
        )
        .increment(1);
    }

    row.as_ref().map(row_to_booking).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hold_aliases_cover_legacy_spellings() {
        let aliases = read_aliases(BookingStatus::Hold);
        assert!(aliases.contains(&"HOLD".to_string()));
        assert!(aliases.contains(&"pending".to_string()));
        assert!(aliases.contains(&"payment_pending".to_string()));

        let cancelled = read_aliases(BookingStatus::Cancelled);
        assert!(cancelled.contains(&"rejected".to_string()));
    }
}
