//! Seat override coordinator: block and unblock.
//!
//! Blocking refuses seats that already belong to a CONFIRMED booking on
//! the route/date; otherwise overrides upsert in one transaction and the
//! blocked set is mirrored into the lock-store cache for display reads.

use chrono::NaiveDate;
use seatline_core::{Error, OverrideStatus, Result, RouteId};
use seatline_postgres::audit::{self, DomainEvent};
use seatline_postgres::{bookings, overrides};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::BookingServices;

/// A block or unblock request that passed surface authentication.
#[derive(Debug, Clone)]
pub struct OverrideRequest {
    /// Route the seats belong to.
    pub route_id: RouteId,
    /// Travel date the override applies to.
    pub trip_date: NaiveDate,
    /// Seats to block or unblock.
    pub seat_numbers: Vec<i32>,
    /// Acting operator or admin, for the audit trail.
    pub actor: String,
    /// Optional reason.
    pub reason: Option<String>,
    /// Intake idempotency key, reused for the audit event.
    pub idempotency_key: String,
}

/// Outcome of an override operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideResponse {
    /// Seats now blocked for the route/date after the operation.
    pub blocked_seats: Vec<i32>,
}

impl BookingServices {
    /// Block seats for a route/date.
    ///
    /// # Errors
    ///
    /// [`Error::SeatAlreadyConfirmed`] when any requested seat is inside
    /// a CONFIRMED booking; [`Error::Validation`] on empty or non-positive
    /// seat lists; retryable infra errors otherwise.
    pub async fn block_seats(&self, req: &OverrideRequest) -> Result<OverrideResponse> {
        Self::validate_seats(&req.seat_numbers)?;

        let confirmed = bookings::confirmed_seats_overlap(
            &self.pool,
            req.route_id,
            req.trip_date,
            &req.seat_numbers,
        )
        .await?;
        if !confirmed.is_empty() {
            return Err(Error::SeatAlreadyConfirmed { seats: confirmed });
        }

        self.apply_override(req, OverrideStatus::Blocked, "seats_blocked")
            .await
    }

    /// Unblock seats for a route/date.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] on empty or non-positive seat lists;
    /// retryable infra errors otherwise.
    pub async fn unblock_seats(&self, req: &OverrideRequest) -> Result<OverrideResponse> {
        Self::validate_seats(&req.seat_numbers)?;
        self.apply_override(req, OverrideStatus::Unblocked, "seats_unblocked")
            .await
    }

    async fn apply_override(
        &self,
        req: &OverrideRequest,
        status: OverrideStatus,
        event_type: &str,
    ) -> Result<OverrideResponse> {
        overrides::upsert_many(
            &self.pool,
            req.route_id,
            req.trip_date,
            &req.seat_numbers,
            status,
            &req.actor,
            req.reason.as_deref(),
        )
        .await?;

        let blocked =
            overrides::blocked_seats(&self.pool, req.route_id, req.trip_date).await?;

        // Mirror refresh is best-effort: the table committed, and the
        // next override refreshes the cache again.
        if let Err(err) = self
            .blocked_cache
            .replace(req.route_id, req.trip_date, &blocked)
            .await
        {
            tracing::warn!(
                route_id = %req.route_id,
                trip_date = %req.trip_date,
                error = %err,
                "blocked-seat cache refresh failed"
            );
        }

        audit::append(
            &self.pool,
            &DomainEvent {
                source: "inventory",
                event_type,
                idempotency_key: req.idempotency_key.clone(),
                payload: json!({
                    "route_id": req.route_id.get(),
                    "trip_date": req.trip_date,
                    "seat_numbers": req.seat_numbers,
                    "actor": req.actor,
                    "reason": req.reason,
                }),
                session_id: None,
                operator_id: None,
            },
        )
        .await?;

        tracing::info!(
            route_id = %req.route_id,
            trip_date = %req.trip_date,
            seats = ?req.seat_numbers,
            status = status.as_str(),
            "seat overrides applied"
        );

        Ok(OverrideResponse {
            blocked_seats: blocked,
        })
    }

    fn validate_seats(seats: &[i32]) -> Result<()> {
        if seats.is_empty() {
            return Err(Error::Validation("seat_numbers must not be empty".into()));
        }
        if seats.iter().any(|s| *s < 1) {
            return Err(Error::Validation("seat numbers start at 1".into()));
        }
        Ok(())
    }
}
