//! Route repository.

use chrono::{DateTime, Utc};
use seatline_core::{Error, OperatorId, Result, RouteId};
use sqlx::{PgPool, Row};

/// A row in `routes`.
#[derive(Debug, Clone)]
pub struct RouteRow {
    /// Route id.
    pub id: RouteId,
    /// Owning operator.
    pub operator_id: OperatorId,
    /// Origin stop.
    pub origin: String,
    /// Destination stop.
    pub destination: String,
    /// Per-seat price in cents.
    pub price_cents: i64,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

fn row_to_route(row: &sqlx::postgres::PgRow) -> RouteRow {
    RouteRow {
        id: RouteId::new(row.get("id")),
        operator_id: OperatorId::new(row.get("operator_id")),
        origin: row.get("origin"),
        destination: row.get("destination"),
        price_cents: row.get("price_cents"),
        created_at: row.get("created_at"),
    }
}

/// Create a route for an operator.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure.
pub async fn create(
    pool: &PgPool,
    operator_id: OperatorId,
    origin: &str,
    destination: &str,
    price_cents: i64,
) -> Result<RouteRow> {
    let row = sqlx::query(
        r"
        INSERT INTO routes (operator_id, origin, destination, price_cents)
        VALUES ($1, $2, $3, $4)
        RETURNING id, operator_id, origin, destination, price_cents, created_at
        ",
    )
    .bind(operator_id.get())
    .bind(origin)
    .bind(destination)
    .bind(price_cents)
    .fetch_one(pool)
    .await
    .map_err(Error::database)?;

    Ok(row_to_route(&row))
}

/// Find a route by id.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure.
pub async fn find_by_id(pool: &PgPool, id: RouteId) -> Result<Option<RouteRow>> {
    let row = sqlx::query(
        r"SELECT id, operator_id, origin, destination, price_cents, created_at
          FROM routes WHERE id = $1",
    )
    .bind(id.get())
    .fetch_optional(pool)
    .await
    .map_err(Error::database)?;

    Ok(row.as_ref().map(row_to_route))
}
