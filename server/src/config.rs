//! Configuration from environment variables.
//!
//! Recognized keys and defaults follow the deployment contract; secrets
//! have no defaults and fail fast when missing so a misconfigured
//! instance never accepts unverifiable webhooks.

use std::env;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP bind host.
    pub host: String,
    /// HTTP bind port.
    pub port: u16,
    /// Postgres connection URL.
    pub database_url: String,
    /// Postgres pool size.
    pub database_max_connections: u32,
    /// Redis connection URL (credentials folded in when provided).
    pub redis_url: String,
    /// Circuit-breaker cooldown after lock-store failures.
    pub redis_circuit_open: Duration,
    /// Default HOLD duration.
    pub hold_duration: Duration,
    /// Stale-takeover threshold for `started` ledger rows.
    pub idempotency_started_ttl: Duration,
    /// Per-IP per-minute webhook cap.
    pub rate_limit_webhooks: u32,
    /// Per-IP per-minute cancellation cap.
    pub rate_limit_cancel: u32,
    /// Platform commission in basis points.
    pub commission_rate_bps: i64,
    /// Chat-webhook HMAC secret.
    pub whatsapp_webhook_secret: String,
    /// Payment-webhook HMAC secret.
    pub payment_webhook_secret: String,
    /// Customer booking-token HMAC secret.
    pub booking_token_secret: String,
    /// Default operator to seed at boot.
    pub operator_phone: Option<String>,
    /// Name of the seeded operator.
    pub operator_name: Option<String>,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("missing required environment variable {key}"))
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// # Errors
    ///
    /// Fails when a required secret (`PAYMENT_WEBHOOK_SECRET`,
    /// `WHATSAPP_WEBHOOK_SECRET`, `BOOKING_TOKEN_SECRET`) or
    /// `DATABASE_URL` is missing.
    pub fn from_env() -> anyhow::Result<Self> {
        let redis_url = Self::redis_url_from_env();

        Ok(Self {
            host: var_or("HOST", "0.0.0.0"),
            port: parse_or("PORT", 8080),
            database_url: required("DATABASE_URL")?,
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10),
            redis_url,
            redis_circuit_open: Duration::from_millis(parse_or("REDIS_CIRCUIT_OPEN_MS", 30_000)),
            hold_duration: Duration::from_secs(parse_or("HOLD_DURATION_MINUTES", 10u64) * 60),
            idempotency_started_ttl: Duration::from_secs(parse_or(
                "IDEMPOTENCY_STARTED_TTL_SECONDS",
                300,
            )),
            rate_limit_webhooks: parse_or("RATE_LIMIT_WEBHOOKS", 60),
            rate_limit_cancel: parse_or("RATE_LIMIT_CANCEL", 10),
            commission_rate_bps: parse_or("COMMISSION_RATE_BPS", 1_000),
            whatsapp_webhook_secret: required("WHATSAPP_WEBHOOK_SECRET")?,
            payment_webhook_secret: required("PAYMENT_WEBHOOK_SECRET")?,
            booking_token_secret: required("BOOKING_TOKEN_SECRET")?,
            operator_phone: env::var("OPERATOR_PHONE").ok(),
            operator_name: env::var("OPERATOR_NAME").ok(),
        })
    }

    /// Fold `REDIS_USERNAME` / `REDIS_PASSWORD` into `REDIS_URL` when the
    /// URL itself carries no credentials.
    fn redis_url_from_env() -> String {
        let url = var_or("REDIS_URL", "redis://127.0.0.1:6379");
        let username = env::var("REDIS_USERNAME").ok();
        let password = env::var("REDIS_PASSWORD").ok();

        if url.contains('@') || (username.is_none() && password.is_none()) {
            return url;
        }

        let Some(rest) = url.strip_prefix("redis://") else {
            return url;
        };
        let auth = match (username, password) {
            (Some(u), Some(p)) => format!("{u}:{p}"),
            (Some(u), None) => u,
            (None, Some(p)) => format!(":{p}"),
            (None, None) => String::new(),
        };
        format!("redis://{auth}@{rest}")
    }
}
