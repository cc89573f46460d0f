//! Router assembly.

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers::{booking, chat, health, inventory, payment, takeover};
use crate::middleware::request_id_layer;
use crate::state::AppState;

/// Build the complete router with middleware layers.
///
/// Webhooks take the raw body (signature verification needs the exact
/// bytes); everything else is JSON. Every response carries
/// `x-request-id`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/webhooks/chat", post(chat::chat_webhook))
        .route("/webhooks/payment", post(payment::payment_webhook))
        .route("/booking/:id/cancel", post(booking::cancel_booking))
        .route("/inventory/block", post(inventory::block_seats))
        .route("/inventory/unblock", post(inventory::unblock_seats))
        .route(
            "/operator/sessions/:id/takeover",
            post(takeover::start_takeover).patch(takeover::patch_takeover),
        )
        .layer(TraceLayer::new_for_http())
        .layer(request_id_layer())
        .with_state(state)
}
