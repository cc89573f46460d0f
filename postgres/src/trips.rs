//! Trip repository.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use seatline_core::{Error, Result, RouteId, TripId};
use sqlx::{PgPool, Row};

/// A row in `trips`.
#[derive(Debug, Clone)]
pub struct TripRow {
    /// Trip id.
    pub id: TripId,
    /// Parent route.
    pub route_id: RouteId,
    /// Travel date.
    pub journey_date: NaiveDate,
    /// Departure time on the travel date.
    pub departure_time: NaiveTime,
    /// Total sellable seats, numbered `1..=seat_quota`.
    pub seat_quota: i32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

fn row_to_trip(row: &sqlx::postgres::PgRow) -> TripRow {
    TripRow {
        id: TripId::new(row.get("id")),
        route_id: RouteId::new(row.get("route_id")),
        journey_date: row.get("journey_date"),
        departure_time: row.get("departure_time"),
        seat_quota: row.get("seat_quota"),
        created_at: row.get("created_at"),
    }
}

/// Create a trip; the `(route_id, journey_date, departure_time)` slot is
/// unique.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure (including a duplicate
/// slot).
pub async fn create(
    pool: &PgPool,
    route_id: RouteId,
    journey_date: NaiveDate,
    departure_time: NaiveTime,
    seat_quota: i32,
) -> Result<TripRow> {
    let row = sqlx::query(
        r"
        INSERT INTO trips (route_id, journey_date, departure_time, seat_quota)
        VALUES ($1, $2, $3, $4)
        RETURNING id, route_id, journey_date, departure_time, seat_quota, created_at
        ",
    )
    .bind(route_id.get())
    .bind(journey_date)
    .bind(departure_time)
    .bind(seat_quota)
    .fetch_one(pool)
    .await
    .map_err(Error::database)?;

    Ok(row_to_trip(&row))
}

/// Find a trip by id.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure.
pub async fn find_by_id(pool: &PgPool, id: TripId) -> Result<Option<TripRow>> {
    let row = sqlx::query(
        r"SELECT id, route_id, journey_date, departure_time, seat_quota, created_at
          FROM trips WHERE id = $1",
    )
    .bind(id.get())
    .fetch_optional(pool)
    .await
    .map_err(Error::database)?;

    Ok(row.as_ref().map(row_to_trip))
}
