//! Operator takeover repository.
//!
//! A takeover claims exclusive operator control over a customer chat
//! session, suppressing automated replies. The partial unique index on
//! `(session_id) WHERE status = 'active'` guarantees at most one active
//! takeover per session; a racing second start hits the index and maps to
//! `TAKEOVER_ALREADY_ACTIVE`.

use chrono::{DateTime, Utc};
use seatline_core::{Error, OperatorId, Result};
use sqlx::{PgPool, Row};

/// A row in `operator_takeovers`.
#[derive(Debug, Clone)]
pub struct TakeoverRow {
    /// Takeover id.
    pub id: i64,
    /// Chat session being controlled.
    pub session_id: String,
    /// Controlling operator.
    pub operator_id: OperatorId,
    /// `active` or `released`.
    pub status: String,
    /// When control started.
    pub started_at: DateTime<Utc>,
    /// When control was released.
    pub released_at: Option<DateTime<Utc>>,
}

fn row_to_takeover(row: &sqlx::postgres::PgRow) -> TakeoverRow {
    TakeoverRow {
        id: row.get("id"),
        session_id: row.get("session_id"),
        operator_id: OperatorId::new(row.get("operator_id")),
        status: row.get("status"),
        started_at: row.get("started_at"),
        released_at: row.get("released_at"),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Start a takeover for a session.
///
/// # Errors
///
/// [`Error::TakeoverAlreadyActive`] when another takeover is active on
/// the session; [`Error::Database`] on other failures.
pub async fn start(
    pool: &PgPool,
    session_id: &str,
    operator_id: OperatorId,
) -> Result<TakeoverRow> {
    let row = sqlx::query(
        r"
        INSERT INTO operator_takeovers (session_id, operator_id, status)
        VALUES ($1, $2, 'active')
        RETURNING id, session_id, operator_id, status, started_at, released_at
        ",
    )
    .bind(session_id)
    .bind(operator_id.get())
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::TakeoverAlreadyActive
        } else {
            Error::database(e)
        }
    })?;

    Ok(row_to_takeover(&row))
}

/// Release the active takeover on a session, if any.
///
/// Returns the released row, or `None` when no takeover was active
/// (release is idempotent).
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure.
pub async fn release(pool: &PgPool, session_id: &str) -> Result<Option<TakeoverRow>> {
    let row = sqlx::query(
        r"
        UPDATE operator_takeovers
        SET status = 'released', released_at = now()
        WHERE session_id = $1 AND status = 'active'
        RETURNING id, session_id, operator_id, status, started_at, released_at
        ",
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await
    .map_err(Error::database)?;

    Ok(row.as_ref().map(row_to_takeover))
}

/// The active takeover on a session, if any.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure.
pub async fn find_active(pool: &PgPool, session_id: &str) -> Result<Option<TakeoverRow>> {
    let row = sqlx::query(
        r"
        SELECT id, session_id, operator_id, status, started_at, released_at
        FROM operator_takeovers
        WHERE session_id = $1 AND status = 'active'
        ",
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await
    .map_err(Error::database)?;

    Ok(row.as_ref().map(row_to_takeover))
}
