//! Connection pool construction and health checks.

use std::time::Duration;

use seatline_core::{Error, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connect to Postgres with the given pool size.
///
/// # Errors
///
/// Returns [`Error::Database`] when the pool cannot be established.
pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect(url)
        .await
        .map_err(Error::database)
}

/// Apply embedded migrations.
///
/// # Errors
///
/// Returns [`Error::Database`] when a migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(Error::database)?;
    tracing::info!("database migrations applied");
    Ok(())
}

/// Readiness ping.
///
/// # Errors
///
/// Returns [`Error::Database`] when the round trip fails.
pub async fn ping(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(Error::database)?;
    Ok(())
}
