//! Operator repository.
//!
//! Operators are immutable after creation apart from the approval flag;
//! the unique normalized phone is how chat messages are attributed.

use chrono::{DateTime, Utc};
use seatline_core::{Error, OperatorId, Phone, Result, RouteId};
use sqlx::{PgPool, Row};

/// A row in `operators`.
#[derive(Debug, Clone)]
pub struct OperatorRow {
    /// Operator id.
    pub id: OperatorId,
    /// Normalized phone (unique).
    pub phone: Phone,
    /// Display name.
    pub name: Option<String>,
    /// Whether the operator may confirm bookings.
    pub approved: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

fn row_to_operator(row: &sqlx::postgres::PgRow) -> Result<OperatorRow> {
    let phone: String = row.get("phone");
    Ok(OperatorRow {
        id: OperatorId::new(row.get("id")),
        phone: Phone::normalize(&phone)?,
        name: row.get("name"),
        approved: row.get("approved"),
        created_at: row.get("created_at"),
    })
}

/// Insert an operator or update the name/approval of an existing phone.
///
/// Used for boot-time seeding of the default operator.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure.
pub async fn upsert(
    pool: &PgPool,
    phone: &Phone,
    name: Option<&str>,
    approved: bool,
) -> Result<OperatorRow> {
    let row = sqlx::query(
        r"
        INSERT INTO operators (phone, name, approved)
        VALUES ($1, $2, $3)
        ON CONFLICT (phone)
        DO UPDATE SET name = COALESCE(EXCLUDED.name, operators.name),
                      approved = EXCLUDED.approved
        RETURNING id, phone, name, approved, created_at
        ",
    )
    .bind(phone.as_str())
    .bind(name)
    .bind(approved)
    .fetch_one(pool)
    .await
    .map_err(Error::database)?;

    row_to_operator(&row)
}

/// Find an operator by id.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure.
pub async fn find_by_id(pool: &PgPool, id: OperatorId) -> Result<Option<OperatorRow>> {
    let row = sqlx::query(
        r"SELECT id, phone, name, approved, created_at FROM operators WHERE id = $1",
    )
    .bind(id.get())
    .fetch_optional(pool)
    .await
    .map_err(Error::database)?;

    row.as_ref().map(row_to_operator).transpose()
}

/// Find an operator by normalized phone.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure.
pub async fn find_by_phone(pool: &PgPool, phone: &Phone) -> Result<Option<OperatorRow>> {
    let row = sqlx::query(
        r"SELECT id, phone, name, approved, created_at FROM operators WHERE phone = $1",
    )
    .bind(phone.as_str())
    .fetch_optional(pool)
    .await
    .map_err(Error::database)?;

    row.as_ref().map(row_to_operator).transpose()
}

/// Whether the operator owns the given route.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure.
pub async fn owns_route(pool: &PgPool, operator_id: OperatorId, route_id: RouteId) -> Result<bool> {
    let owns: bool = sqlx::query_scalar(
        r"SELECT EXISTS(SELECT 1 FROM routes WHERE id = $1 AND operator_id = $2)",
    )
    .bind(route_id.get())
    .bind(operator_id.get())
    .fetch_one(pool)
    .await
    .map_err(Error::database)?;

    Ok(owns)
}
