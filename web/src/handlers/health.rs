//! Liveness and readiness endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

/// Liveness body.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always `ok` while the process serves requests.
    pub status: &'static str,
    /// Crate version.
    pub version: &'static str,
}

/// `GET /health`: process liveness, no dependency checks.
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// Readiness body with per-dependency detail.
#[derive(Serialize)]
pub struct ReadinessResponse {
    /// All dependencies reachable.
    pub ready: bool,
    /// Postgres round trip.
    pub database: bool,
    /// Lock store round trip.
    pub lock_store: bool,
}

/// `GET /ready`: pings Postgres and the lock store.
pub async fn readiness_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let database = seatline_postgres::ping(state.services.pool()).await.is_ok();
    let lock_store = state.lock_store.ping().await.is_ok();
    let ready = database && lock_store;

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ready,
            database,
            lock_store,
        }),
    )
}
