//! Cancellation endpoint.
//!
//! `POST /booking/:id/cancel` with an `X-Idempotency-Key`. Customers
//! additionally authenticate with the per-booking token; operators by id
//! or phone (route ownership is checked in the coordinator); admins pass
//! through (operator-dashboard authentication fronts this service).

use axum::extract::{Path, State};
use axum::Json;
use seatline_core::{BookingId, CancelActor, Error, OperatorId, Phone};
use seatline_postgres::LedgerScope;
use seatline_services::cancellations::{CancelIdentity, CancelRequest};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::extractors::{ClientIp, IdempotencyKey};
use crate::signature::verify_booking_token;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct CancelBody {
    actor: String,
    cancellation_reason: Option<String>,
    customer_phone: Option<String>,
    operator_id: Option<i64>,
    operator_phone: Option<String>,
    booking_token: Option<String>,
}

fn build_identity(
    state: &AppState,
    booking_id: BookingId,
    body: &CancelBody,
) -> Result<CancelIdentity, Error> {
    match body.actor.as_str() {
        "admin" => Ok(CancelIdentity::Admin),
        "customer" => {
            let token = body
                .booking_token
                .as_deref()
                .ok_or_else(|| Error::Validation("customer cancel requires booking_token".into()))?;
            verify_booking_token(&state.secrets.booking_token, booking_id, token)?;

            let phone = body
                .customer_phone
                .as_deref()
                .ok_or_else(|| Error::Validation("customer cancel requires customer_phone".into()))?;
            Ok(CancelIdentity::Customer {
                phone: Phone::normalize(phone)?,
            })
        },
        "operator" => {
            let operator_id = body.operator_id.map(OperatorId::new);
            let operator_phone = body
                .operator_phone
                .as_deref()
                .map(Phone::normalize)
                .transpose()?;
            if operator_id.is_none() && operator_phone.is_none() {
                return Err(Error::Validation(
                    "operator cancel requires operator_id or operator_phone".into(),
                ));
            }
            Ok(CancelIdentity::Operator {
                operator_id,
                operator_phone,
            })
        },
        other => Err(Error::Validation(format!("unknown actor: {other}"))),
    }
}

const fn actor_of(identity: &CancelIdentity) -> CancelActor {
    match identity {
        CancelIdentity::Admin => CancelActor::Admin,
        CancelIdentity::Customer { .. } => CancelActor::Customer,
        CancelIdentity::Operator { .. } => CancelActor::Operator,
    }
}

/// `POST /booking/:id/cancel`
///
/// # Errors
///
/// 400 on validation, 401 on a bad booking token, 403 on ownership, 404
/// on an unknown booking, 409 for non-CONFIRMED bookings or a concurrent
/// cancel, 429 on rate limit, 503 on infra outage.
pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ClientIp(ip): ClientIp,
    IdempotencyKey(idempotency_key): IdempotencyKey,
    Json(body): Json<CancelBody>,
) -> Result<Json<Value>, ApiError> {
    state
        .rate_limiter
        .check("cancel", state.limits.cancel_per_minute, ip)
        .await?;

    let booking_id = BookingId::new(id);
    let identity = build_identity(&state, booking_id, &body)?;
    let actor = actor_of(&identity);

    let request = CancelRequest {
        booking_id,
        identity,
        reason: body.cancellation_reason.clone(),
        idempotency_key: idempotency_key.clone(),
    };

    let services = state.services.clone();
    let response = state
        .ledger
        .with_idempotency(
            LedgerScope {
                source: "booking",
                event_type: "booking_cancel",
                idempotency_key: &idempotency_key,
                session_id: None,
                operator_id: body.operator_id,
            },
            &json!({
                "booking_id": id,
                "actor": actor.as_str(),
                "reason": body.cancellation_reason,
            }),
            || async move { services.cancel_booking(&request).await },
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "booking": response.booking,
        "cancellation": response.cancellation,
        "idempotent": response.idempotent,
    })))
}
