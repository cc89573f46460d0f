//! Operator takeover endpoints.
//!
//! `POST /operator/sessions/:id/takeover` starts a takeover;
//! `PATCH` with `{"action": "release" | "resume"}` releases it or
//! resumes control.

use axum::extract::{Path, State};
use axum::Json;
use seatline_core::{Error, OperatorId};
use seatline_postgres::LedgerScope;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::extractors::{ClientIp, IdempotencyKey};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct StartBody {
    operator_id: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PatchBody {
    action: String,
    operator_id: Option<i64>,
}

/// `POST /operator/sessions/:id/takeover`
///
/// # Errors
///
/// 400 on validation, 409 `TAKEOVER_ALREADY_ACTIVE`, 429 on rate limit,
/// 503 on infra outage.
pub async fn start_takeover(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    ClientIp(ip): ClientIp,
    IdempotencyKey(key): IdempotencyKey,
    Json(body): Json<StartBody>,
) -> Result<Json<Value>, ApiError> {
    state
        .rate_limiter
        .check("takeover", state.limits.cancel_per_minute, ip)
        .await?;

    let operator_id = OperatorId::new(body.operator_id);
    let services = state.services.clone();
    let session = session_id.clone();

    let takeover = state
        .ledger
        .with_idempotency(
            LedgerScope {
                source: "operator",
                event_type: "takeover_start",
                idempotency_key: &key,
                session_id: Some(&session_id),
                operator_id: Some(body.operator_id),
            },
            &json!({ "session_id": session_id, "operator_id": body.operator_id }),
            || async move { services.start_takeover(&session, operator_id).await },
        )
        .await?;

    Ok(Json(json!({ "success": true, "takeover": takeover })))
}

/// `PATCH /operator/sessions/:id/takeover`
///
/// # Errors
///
/// 400 for an unknown action, 409 when resuming a session another
/// operator holds, 429 on rate limit, 503 on infra outage.
pub async fn patch_takeover(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    ClientIp(ip): ClientIp,
    IdempotencyKey(key): IdempotencyKey,
    Json(body): Json<PatchBody>,
) -> Result<Json<Value>, ApiError> {
    state
        .rate_limiter
        .check("takeover", state.limits.cancel_per_minute, ip)
        .await?;

    match body.action.as_str() {
        "release" => {
            let services = state.services.clone();
            let session = session_id.clone();
            let released = state
                .ledger
                .with_idempotency(
                    LedgerScope {
                        source: "operator",
                        event_type: "takeover_release",
                        idempotency_key: &key,
                        session_id: Some(&session_id),
                        operator_id: None,
                    },
                    &json!({ "session_id": session_id }),
                    || async move { services.release_takeover(&session).await },
                )
                .await?;
            Ok(Json(json!({ "success": true, "takeover": released })))
        },
        "resume" => {
            let operator_id = body
                .operator_id
                .map(OperatorId::new)
                .ok_or_else(|| Error::Validation("resume requires operator_id".into()))?;
            let services = state.services.clone();
            let session = session_id.clone();
            let takeover = state
                .ledger
                .with_idempotency(
                    LedgerScope {
                        source: "operator",
                        event_type: "takeover_resume",
                        idempotency_key: &key,
                        session_id: Some(&session_id),
                        operator_id: body.operator_id,
                    },
                    &json!({ "session_id": session_id, "operator_id": body.operator_id }),
                    || async move { services.resume_takeover(&session, operator_id).await },
                )
                .await?;
            Ok(Json(json!({ "success": true, "takeover": takeover })))
        },
        other => Err(ApiError::from(Error::Validation(format!(
            "unknown action: {other}"
        )))),
    }
}
