//! Message log repository.
//!
//! Append-only trail of chat traffic, inbound and outbound, for operator
//! dashboards and incident review.

use seatline_core::{Error, Result};
use sqlx::PgPool;

/// Traffic direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Received from the chat platform.
    Inbound,
    /// Sent (or suppressed) by this service.
    Outbound,
}

impl Direction {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

/// A message-log entry to append.
#[derive(Debug, Clone)]
pub struct NewMessageLog<'a> {
    /// Chat session id, when known.
    pub session_id: Option<&'a str>,
    /// Traffic direction.
    pub direction: Direction,
    /// Customer phone, when known.
    pub customer_phone: Option<&'a str>,
    /// Provider message id.
    pub message_id: Option<&'a str>,
    /// Provider message type (`text`, `image`, `document`).
    pub message_type: Option<&'a str>,
    /// Text body, when present.
    pub body: Option<&'a str>,
}

/// Append a message-log entry.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure.
pub async fn append(pool: &PgPool, entry: &NewMessageLog<'_>) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO message_logs (
            session_id, direction, customer_phone, message_id, message_type, body
        ) VALUES ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(entry.session_id)
    .bind(entry.direction.as_str())
    .bind(entry.customer_phone)
    .bind(entry.message_id)
    .bind(entry.message_type)
    .bind(entry.body)
    .execute(pool)
    .await
    .map_err(Error::database)?;

    Ok(())
}
