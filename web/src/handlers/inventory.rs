//! Seat override endpoints: block and unblock.
//!
//! Unlike every other surface, this one reports infrastructure failures
//! as 500 rather than 503, so every error funnels through
//! [`ApiError::inventory`].

use axum::extract::State;
use axum::Json;
use chrono::NaiveDate;
use seatline_core::{Error, RouteId};
use seatline_postgres::LedgerScope;
use seatline_services::overrides::OverrideRequest;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::extractors::{ClientIp, IdempotencyKey};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct OverrideBody {
    route_id: i64,
    trip_date: NaiveDate,
    seat_numbers: Vec<i32>,
    actor: Option<String>,
    reason: Option<String>,
}

async fn apply(
    state: AppState,
    idempotency_key: String,
    body: OverrideBody,
    block: bool,
) -> Result<Json<Value>, ApiError> {
    let request = OverrideRequest {
        route_id: RouteId::new(body.route_id),
        trip_date: body.trip_date,
        seat_numbers: body.seat_numbers.clone(),
        actor: body.actor.clone().unwrap_or_else(|| "admin".to_string()),
        reason: body.reason.clone(),
        idempotency_key: idempotency_key.clone(),
    };

    let event_type = if block { "seats_blocked" } else { "seats_unblocked" };
    let services = state.services.clone();

    let response = state
        .ledger
        .with_idempotency(
            LedgerScope {
                source: "inventory",
                event_type,
                idempotency_key: &idempotency_key,
                session_id: None,
                operator_id: None,
            },
            &json!({
                "route_id": body.route_id,
                "trip_date": body.trip_date,
                "seat_numbers": body.seat_numbers,
            }),
            || async move {
                if block {
                    services.block_seats(&request).await
                } else {
                    services.unblock_seats(&request).await
                }
            },
        )
        .await
        .map_err(ApiError::inventory)?;

    Ok(Json(json!({
        "success": true,
        "blocked_seats": response.blocked_seats,
    })))
}

/// `POST /inventory/block`
///
/// # Errors
///
/// 400 on validation, 409 `SEAT_ALREADY_CONFIRMED`, 429 on rate limit,
/// 500 on infra failure.
pub async fn block_seats(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    IdempotencyKey(key): IdempotencyKey,
    Json(body): Json<OverrideBody>,
) -> Result<Json<Value>, ApiError> {
    state
        .rate_limiter
        .check("inventory", state.limits.cancel_per_minute, ip)
        .await
        .map_err(ApiError::inventory)?;
    if body.route_id <= 0 {
        return Err(ApiError::inventory(Error::Validation(
            "route_id must be positive".into(),
        )));
    }
    apply(state, key, body, true).await
}

/// `POST /inventory/unblock`
///
/// # Errors
///
/// 400 on validation, 429 on rate limit, 500 on infra failure.
pub async fn unblock_seats(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    IdempotencyKey(key): IdempotencyKey,
    Json(body): Json<OverrideBody>,
) -> Result<Json<Value>, ApiError> {
    state
        .rate_limiter
        .check("inventory", state.limits.cancel_per_minute, ip)
        .await
        .map_err(ApiError::inventory)?;
    if body.route_id <= 0 {
        return Err(ApiError::inventory(Error::Validation(
            "route_id must be positive".into(),
        )));
    }
    apply(state, key, body, false).await
}
