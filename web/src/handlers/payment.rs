//! Payment-gateway webhook intake.
//!
//! Pipeline: rate limit, timestamped HMAC
//! (`x-payment-timestamp` / `x-payment-signature`, ±5 min), replay nonce
//! (the signature: gateway retries re-sign with a fresh timestamp, so a
//! legitimate redelivery carries a new nonce while a captured replay does
//! not), body parsing, idempotency (key = `gateway_event_id`), then the
//! payment-apply coordinator.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use seatline_core::{BookingId, Error, PaymentOutcome};
use seatline_postgres::LedgerScope;
use seatline_services::payments::PaymentApplyRequest;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::extractors::ClientIp;
use crate::signature::verify_timestamped_signature;
use crate::state::AppState;

const NONCE_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Deserialize)]
struct PaymentEvent {
    gateway_event_id: String,
    status: String,
    metadata: PaymentMetadata,
}

#[derive(Debug, Deserialize)]
struct PaymentMetadata {
    booking_id: i64,
}

/// `POST /webhooks/payment`
///
/// # Errors
///
/// 429 on rate limit, 401 on a bad signature or stale timestamp, 409 on
/// a replayed capture or a duplicate in flight, 400 on a malformed body
/// or unknown status, 503 on infra outage.
pub async fn payment_webhook(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    state
        .rate_limiter
        .check("webhooks", state.limits.webhooks_per_minute, ip)
        .await?;

    let timestamp = headers
        .get("x-payment-timestamp")
        .and_then(|v| v.to_str().ok())
        .ok_or(Error::SignatureInvalid)?;
    let signature = headers
        .get("x-payment-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(Error::SignatureInvalid)?;

    verify_timestamped_signature(
        &state.secrets.payment_webhook,
        timestamp,
        &body,
        signature,
        Utc::now().timestamp(),
    )?;

    state
        .replay
        .register("payment", signature, NONCE_TTL)
        .await?;

    let event: PaymentEvent = serde_json::from_slice(&body)
        .map_err(|e| Error::Validation(format!("malformed payment event: {e}")))?;

    // Unknown gateway statuses are a sender bug, rejected before the
    // ledger sees the key.
    let outcome = PaymentOutcome::from_gateway(&event.status)
        .ok_or_else(|| Error::Validation(format!("unknown gateway status: {}", event.status)))?;
    let event_type = match outcome {
        PaymentOutcome::Confirmed => "payment_success",
        PaymentOutcome::Expired => "payment_failed",
    };

    let request = PaymentApplyRequest {
        gateway_event_id: event.gateway_event_id.clone(),
        status: event.status.clone(),
        booking_id: BookingId::new(event.metadata.booking_id),
    };

    let services = state.services.clone();
    let response = state
        .ledger
        .with_idempotency(
            LedgerScope {
                source: "payment",
                event_type,
                idempotency_key: &event.gateway_event_id,
                session_id: None,
                operator_id: None,
            },
            &json!({
                "gateway_event_id": event.gateway_event_id,
                "status": event.status,
                "booking_id": event.metadata.booking_id,
            }),
            || async move { services.apply_payment(&request).await },
        )
        .await?;

    Ok(Json(serde_json::to_value(response).map_err(Error::from)?))
}
