//! Inventory override repository.
//!
//! An override pins a specific seat on a specific travel date as blocked
//! or unblocked, independent of bookings. The `(route_id, trip_date,
//! seat_number)` uniqueness makes repeated block/unblock an upsert.

use chrono::NaiveDate;
use seatline_core::{Error, OverrideStatus, Result, RouteId};
use sqlx::PgPool;

/// Upsert overrides for a set of seats in one transaction.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure.
pub async fn upsert_many(
    pool: &PgPool,
    route_id: RouteId,
    trip_date: NaiveDate,
    seat_numbers: &[i32],
    status: OverrideStatus,
    actor: &str,
    reason: Option<&str>,
) -> Result<()> {
    let mut tx = pool.begin().await.map_err(Error::database)?;

    for &seat in seat_numbers {
        sqlx::query(
            r"
            INSERT INTO inventory_overrides (route_id, trip_date, seat_number, status, actor, reason)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (route_id, trip_date, seat_number)
            DO UPDATE SET status = EXCLUDED.status,
                          actor = EXCLUDED.actor,
                          reason = EXCLUDED.reason,
                          updated_at = now()
            ",
        )
        .bind(route_id.get())
        .bind(trip_date)
        .bind(seat)
        .bind(status.as_str())
        .bind(actor)
        .bind(reason)
        .execute(&mut *tx)
        .await
        .map_err(Error::database)?;
    }

    tx.commit().await.map_err(Error::database)?;

    metrics::counter!(
        "seatline.overrides.upserted",
        "status" => status.as_str()
    )
    .increment(seat_numbers.len() as u64);

    Ok(())
}

/// Seat numbers currently blocked for a route on a date, ascending.
///
/// # Errors
///
/// Returns [`Error::Database`] on query failure.
pub async fn blocked_seats(
    pool: &PgPool,
    route_id: RouteId,
    trip_date: NaiveDate,
) -> Result<Vec<i32>> {
    let seats: Vec<i32> = sqlx::query_scalar(
        r"
        SELECT seat_number FROM inventory_overrides
        WHERE route_id = $1 AND trip_date = $2 AND status = 'blocked'
        ORDER BY seat_number
        ",
    )
    .bind(route_id.get())
    .bind(trip_date)
    .fetch_all(pool)
    .await
    .map_err(Error::database)?;

    Ok(seats)
}
