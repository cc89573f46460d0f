//! Seatline HTTP server.
//!
//! Wires the storage, lock-store and coordinator layers, seeds the
//! default operator, starts the reconciliation schedules and serves the
//! intake surfaces until shutdown.

mod config;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use seatline_core::Phone;
use seatline_locks::LockStore;
use seatline_postgres::IdempotencyLedger;
use seatline_runtime::CircuitBreakerConfig;
use seatline_services::{BookingServices, ServicesConfig, TracingChatClient};
use seatline_web::{build_router, AppState, RateLimits, Secrets};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Config;

/// How often overdue holds are expired.
const HOLD_EXPIRY_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Safety-net cadence for the orphan pass (also runs once at boot).
const ORPHAN_RECONCILE_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seatline=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!(host = %config.host, port = config.port, "starting seatline server");

    let pool = seatline_postgres::connect(&config.database_url, config.database_max_connections)
        .await
        .map_err(|e| anyhow::anyhow!("database connect failed: {e}"))?;
    seatline_postgres::run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("migrations failed: {e}"))?;

    let lock_store = LockStore::connect(
        &config.redis_url,
        CircuitBreakerConfig::with_open_window(config.redis_circuit_open),
    )
    .await
    .map_err(|e| anyhow::anyhow!("lock store connect failed: {e}"))?;
    info!("lock store connected");

    let services = Arc::new(BookingServices::new(
        pool.clone(),
        lock_store.seat_locks(),
        lock_store.blocked_cache(),
        Arc::new(TracingChatClient),
        ServicesConfig {
            hold_duration: config.hold_duration,
            commission_rate_bps: config.commission_rate_bps,
            ..ServicesConfig::default()
        },
    ));

    seed_default_operator(&pool, &config).await;

    // Reconverge state left behind by a crash before taking traffic.
    match services.reconcile_orphaned_holds().await {
        Ok(report) => info!(
            expired = report.expired,
            respected = report.respected,
            "boot-time orphan reconciliation done"
        ),
        Err(err) => warn!(error = %err, "boot-time orphan reconciliation failed"),
    }

    spawn_reconciliation_schedules(Arc::clone(&services));

    let state = AppState::new(
        Arc::clone(&services),
        IdempotencyLedger::new(pool.clone(), config.idempotency_started_ttl),
        &lock_store,
        Secrets {
            chat_webhook: config.whatsapp_webhook_secret.clone(),
            payment_webhook: config.payment_webhook_secret.clone(),
            booking_token: config.booking_token_secret.clone(),
        },
        RateLimits {
            webhooks_per_minute: config.rate_limit_webhooks,
            cancel_per_minute: config.rate_limit_cancel,
        },
    );

    let app = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutdown complete");
    Ok(())
}

/// Upsert the default operator from `OPERATOR_PHONE` / `OPERATOR_NAME`.
async fn seed_default_operator(pool: &sqlx::PgPool, config: &Config) {
    let Some(raw_phone) = config.operator_phone.as_deref() else {
        return;
    };

    let phone = match Phone::normalize(raw_phone) {
        Ok(phone) => phone,
        Err(err) => {
            warn!(error = %err, "OPERATOR_PHONE is not a valid phone, skipping seed");
            return;
        },
    };

    match seatline_postgres::operators::upsert(
        pool,
        &phone,
        config.operator_name.as_deref(),
        true,
    )
    .await
    {
        Ok(operator) => info!(operator_id = %operator.id, "default operator seeded"),
        Err(err) => warn!(error = %err, "default operator seed failed"),
    }
}

/// Start the two independent reconciliation schedules.
fn spawn_reconciliation_schedules(services: Arc<BookingServices>) {
    let expiry_services = Arc::clone(&services);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(HOLD_EXPIRY_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Err(err) = expiry_services.expire_due_holds(Utc::now()).await {
                error!(error = %err, "hold expiry pass failed");
            }
        }
    });

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ORPHAN_RECONCILE_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Err(err) = services.reconcile_orphaned_holds().await {
                error!(error = %err, "orphan reconciliation pass failed");
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            },
            Err(err) => error!(error = %err, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received ctrl-c"),
        () = terminate => info!("received SIGTERM"),
    }
}
