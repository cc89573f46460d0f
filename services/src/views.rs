//! Serializable views of storage rows.
//!
//! Handler responses are persisted verbatim in the idempotency ledger and
//! replayed to duplicate deliveries, so everything a coordinator returns
//! is a plain serde struct rather than a repository row.

use chrono::{DateTime, Utc};
use seatline_core::BookingStatus;
use serde::{Deserialize, Serialize};

use seatline_postgres::bookings::BookingRow;
use seatline_postgres::cancellations::CancellationRow;

/// Wire view of a booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingView {
    /// Booking id.
    pub id: i64,
    /// Trip id.
    pub trip_id: i64,
    /// Normalized customer phone.
    pub customer_phone: String,
    /// Optional customer name.
    pub customer_name: Option<String>,
    /// Seats booked.
    pub seat_count: i32,
    /// Assigned seat numbers.
    pub seat_numbers: Vec<i32>,
    /// Lifecycle status.
    pub status: BookingStatus,
    /// Hold deadline, while held.
    pub hold_expires_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<&BookingRow> for BookingView {
    fn from(row: &BookingRow) -> Self {
        Self {
            id: row.id.get(),
            trip_id: row.trip_id.get(),
            customer_phone: row.customer_phone.clone(),
            customer_name: row.customer_name.clone(),
            seat_count: row.seat_count,
            seat_numbers: row.seat_numbers.clone(),
            status: row.status,
            hold_expires_at: row.hold_expires_at,
            created_at: row.created_at,
        }
    }
}

/// Wire view of a cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationView {
    /// The cancelled booking.
    pub booking_id: i64,
    /// Who cancelled.
    pub actor: String,
    /// Optional reason.
    pub reason: Option<String>,
    /// Refund requested, in cents.
    pub refund_cents: Option<i64>,
    /// When the cancellation was recorded.
    pub created_at: DateTime<Utc>,
}

impl From<&CancellationRow> for CancellationView {
    fn from(row: &CancellationRow) -> Self {
        Self {
            booking_id: row.booking_id.get(),
            actor: row.actor.clone(),
            reason: row.reason.clone(),
            refund_cents: row.refund_cents,
            created_at: row.created_at,
        }
    }
}
