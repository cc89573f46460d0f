//! Append-only audit event log.
//!
//! The same table backs two roles: the idempotency ledger (rows created
//! `started` by [`crate::idempotency`]) and the domain trail (rows
//! appended here already `completed`). Both lean on the uniqueness of
//! `(source, event_type, idempotency_key)`.

use chrono::{DateTime, Utc};
use seatline_core::{Error, LedgerStatus, Result};
use serde_json::Value;
use sqlx::{PgPool, Row};

/// A row in `audit_events`.
#[derive(Debug, Clone)]
pub struct AuditEventRow {
    /// Row id.
    pub id: i64,
    /// Originating surface (`payment`, `whatsapp`, `operator`, …).
    pub source: String,
    /// Event type within the source.
    pub event_type: String,
    /// De-duplication key.
    pub idempotency_key: String,
    /// Ledger status.
    pub status: LedgerStatus,
    /// Hash of the canonicalized request (informational).
    pub request_hash: Option<String>,
    /// Stored handler response, replayed verbatim on duplicates.
    pub response_snapshot: Option<Value>,
    /// Stored handler error.
    pub error_snapshot: Option<String>,
    /// Chat session attribution.
    pub session_id: Option<String>,
    /// Operator attribution.
    pub operator_id: Option<i64>,
    /// Original request payload.
    pub payload: Option<Value>,
    /// When the row was (last) started.
    pub created_at: DateTime<Utc>,
    /// When the row reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
}

const AUDIT_COLUMNS: &str = r"
    id, source, event_type, idempotency_key, status, request_hash,
    response_snapshot, error_snapshot, session_id, operator_id, payload,
    created_at, completed_at
";

pub(crate) fn row_to_audit(row: &sqlx::postgres::PgRow) -> Result<AuditEventRow> {
    let status: String = row.get("status");
    Ok(AuditEventRow {
        id: row.get("id"),
        source: row.get("source"),
        event_type: row.get("event_type"),
        idempotency_key: row.get("idempotency_key"),
        status: LedgerStatus::parse(&status)?,
        request_hash: row.get("request_hash"),
        response_snapshot: row.get("response_snapshot"),
        error_snapshot: row.get("error_snapshot"),
        session_id: row.get("session_id"),
        operator_id: row.get("operator_id"),
        payload: row.get("payload"),
        created_at: row.get("created_at"),
        completed_at: row.get("completed_at"),
    })
}

/// A domain event to append in terminal (`completed`) form.
#[derive(Debug, Clone)]
pub struct DomainEvent<'a> {
    /// Originating surface.
    pub source: &'a str,
    /// Event type.
    pub event_type: &'a str,
    /// De-duplication key; replays are dropped silently.
    pub idempotency_key: String,
    /// Event payload.
    pub payload: Value,
    /// Chat session attribution.
    pub session_id: Option<&'a str>,
    /// Operator attribution.
    pub operator_id: Option<i64>,
}

/// Append a completed domain event; duplicate keys are a no-op.
///
/// Returns whether a row was actually written.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure.
pub async fn append(pool: &PgPool, event: &DomainEvent<'_>) -> Result<bool> {
    let result = sqlx::query(
        r"
        INSERT INTO audit_events (
            source, event_type, idempotency_key, status,
            payload, session_id, operator_id, completed_at
        ) VALUES ($1, $2, $3, 'completed', $4, $5, $6, now())
        ON CONFLICT (source, event_type, idempotency_key) DO NOTHING
        ",
    )
    .bind(event.source)
    .bind(event.event_type)
    .bind(&event.idempotency_key)
    .bind(&event.payload)
    .bind(event.session_id)
    .bind(event.operator_id)
    .execute(pool)
    .await
    .map_err(Error::database)?;

    let written = result.rows_affected() == 1;
    if written {
        metrics::counter!(
            "seatline.audit.appended",
            "source" => event.source.to_string(),
            "event_type" => event.event_type.to_string()
        )
        .increment(1);
    }

    Ok(written)
}

/// Look up an audit row by its unique triple.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure.
pub async fn find(
    pool: &PgPool,
    source: &str,
    event_type: &str,
    idempotency_key: &str,
) -> Result<Option<AuditEventRow>> {
    let row = sqlx::query(&format!(
        r"
        SELECT {AUDIT_COLUMNS} FROM audit_events
        WHERE source = $1 AND event_type = $2 AND idempotency_key = $3
        "
    ))
    .bind(source)
    .bind(event_type)
    .bind(idempotency_key)
    .fetch_optional(pool)
    .await
    .map_err(Error::database)?;

    row.as_ref().map(row_to_audit).transpose()
}
