//! Idempotency ledger: at-most-once execution per external event.
//!
//! Every intake surface wraps its domain handler in
//! [`IdempotencyLedger::with_idempotency`]. The ledger row lives in
//! `audit_events`; its `(source, event_type, idempotency_key)`
//! uniqueness resolves insertion races, and its status machine
//! (`started -> completed | failed`) decides what a duplicate delivery
//! sees:
//!
//! - `completed`: the stored response is returned verbatim, the handler
//!   never re-runs.
//! - `failed`: the row is retaken and the handler re-runs (a failure must
//!   not poison the key forever).
//! - `started`, younger than the started-TTL: the first delivery is still
//!   in flight; the duplicate is told to retry later.
//! - `started`, older than the TTL: the original worker is presumed dead;
//!   the row is atomically taken over and the handler re-runs exactly
//!   once.
//!
//! A `completed` row is always durable before the response is released,
//! so at-least-once callers never observe an absent record.

use std::time::Duration;

use chrono::Utc;
use seatline_core::hashing::request_hash;
use seatline_core::{Error, LedgerStatus, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;

use crate::audit::{self, AuditEventRow};

/// Identity of a ledger entry plus its attribution.
#[derive(Debug, Clone, Copy)]
pub struct LedgerScope<'a> {
    /// Originating surface (`payment`, `whatsapp`, `operator`, …).
    pub source: &'a str,
    /// Event type within the source.
    pub event_type: &'a str,
    /// Caller-supplied or event-derived idempotency key.
    pub idempotency_key: &'a str,
    /// Chat session attribution, if any.
    pub session_id: Option<&'a str>,
    /// Operator attribution, if any.
    pub operator_id: Option<i64>,
}

/// The idempotency ledger over `audit_events`.
#[derive(Debug, Clone)]
pub struct IdempotencyLedger {
    pool: PgPool,
    started_ttl: Duration,
}

impl IdempotencyLedger {
    /// Default stale-takeover threshold for `started` rows.
    pub const DEFAULT_STARTED_TTL: Duration = Duration::from_secs(300);

    /// Create a ledger with the given started-TTL.
    #[must_use]
    pub const fn new(pool: PgPool, started_ttl: Duration) -> Self {
        Self { pool, started_ttl }
    }

    /// Run `handler` at most once for this scope.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateInFlight`] when another delivery owns a young
    /// `started` row; handler errors are persisted to the row and
    /// propagated; [`Error::Database`] on storage failure.
    pub async fn with_idempotency<T, F, Fut>(
        &self,
        scope: LedgerScope<'_>,
        request: &Value,
        handler: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let hash = request_hash(request);

        if let Some(id) = self.try_insert_started(scope, &hash, request).await? {
            return self.run_and_record(id, handler).await;
        }

        // Lost the insert race or the key already exists: branch on the
        // stored row.
        let row = audit::find(
            &self.pool,
            scope.source,
            scope.event_type,
            scope.idempotency_key,
        )
        .await?
        .ok_or_else(|| Error::Database("ledger row vanished after conflict".into()))?;

        if row.request_hash.as_deref().is_some_and(|h| h != hash) {
            tracing::warn!(
                source = scope.source,
                event_type = scope.event_type,
                idempotency_key = scope.idempotency_key,
                "retried idempotency key carries a different payload"
            );
        }

        match row.status {
            LedgerStatus::Completed => {
                metrics::counter!("seatline.idempotency.replayed").increment(1);
                tracing::info!(
                    source = scope.source,
                    event_type = scope.event_type,
                    idempotency_key = scope.idempotency_key,
                    "replaying stored response for duplicate delivery"
                );
                let snapshot = row
                    .response_snapshot
                    .ok_or_else(|| Error::Database("completed ledger row has no snapshot".into()))?;
                Ok(serde_json::from_value(snapshot)?)
            },
            LedgerStatus::Failed => {
                let Some(id) = self.try_retake(row.id, &hash, request, "failed").await? else {
                    return Err(Error::DuplicateInFlight);
                };
                self.run_and_record(id, handler).await
            },
            LedgerStatus::Started => self.handle_started(&row, scope, &hash, request, handler).await,
        }
    }

    async fn handle_started<T, F, Fut>(
        &self,
        row: &AuditEventRow,
        scope: LedgerScope<'_>,
        hash: &str,
        request: &Value,
        handler: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let age = Utc::now().signed_duration_since(row.created_at);
        let ttl = chrono::Duration::from_std(self.started_ttl)
            .map_err(|e| Error::Serialization(e.to_string()))?;

        if age < ttl {
            tracing::info!(
                source = scope.source,
                event_type = scope.event_type,
                idempotency_key = scope.idempotency_key,
                age_secs = age.num_seconds(),
                "duplicate delivery while original is in flight"
            );
            return Err(Error::DuplicateInFlight);
        }

        // Stale: the original worker died mid-handler. Take the row over
        // atomically; exactly one contender wins.
        let Some(id) = self.try_takeover_stale(row.id, hash, request).await? else {
            return Err(Error::DuplicateInFlight);
        };

        metrics::counter!("seatline.idempotency.stale_takeovers").increment(1);
        tracing::warn!(
            source = scope.source,
            event_type = scope.event_type,
            idempotency_key = scope.idempotency_key,
            age_secs = age.num_seconds(),
            "taking over stale started ledger row"
        );
        self.run_and_record(id, handler).await
    }

    /// Insert the `started` row; `None` when the key already exists.
    async fn try_insert_started(
        &self,
        scope: LedgerScope<'_>,
        hash: &str,
        request: &Value,
    ) -> Result<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar(
            r"
            INSERT INTO audit_events (
                source, event_type, idempotency_key, status,
                request_hash, payload, session_id, operator_id
            ) VALUES ($1, $2, $3, 'started', $4, $5, $6, $7)
            ON CONFLICT (source, event_type, idempotency_key) DO NOTHING
            RETURNING id
            ",
        )
        .bind(scope.source)
        .bind(scope.event_type)
        .bind(scope.idempotency_key)
        .bind(hash)
        .bind(request)
        .bind(scope.session_id)
        .bind(scope.operator_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::database)?;

        Ok(id)
    }

    /// Retake a row in the given terminal-ish status; `None` when a
    /// concurrent retake won.
    async fn try_retake(
        &self,
        id: i64,
        hash: &str,
        request: &Value,
        from_status: &str,
    ) -> Result<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar(
            r"
            UPDATE audit_events
            SET status = 'started', created_at = now(), completed_at = NULL,
                response_snapshot = NULL, error_snapshot = NULL,
                request_hash = $2, payload = $3
            WHERE id = $1 AND status = $4
            RETURNING id
            ",
        )
        .bind(id)
        .bind(hash)
        .bind(request)
        .bind(from_status)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::database)?;

        Ok(id)
    }

    /// Take over a stale `started` row; the `created_at` cutoff in the
    /// guard makes exactly one contender win.
    async fn try_takeover_stale(
        &self,
        id: i64,
        hash: &str,
        request: &Value,
    ) -> Result<Option<i64>> {
        let ttl_secs = self.started_ttl.as_secs_f64();
        let id: Option<i64> = sqlx::query_scalar(
            r"
            UPDATE audit_events
            SET status = 'started', created_at = now(), completed_at = NULL,
                response_snapshot = NULL, error_snapshot = NULL,
                request_hash = $2, payload = $3
            WHERE id = $1 AND status = 'started'
              AND created_at < now() - make_interval(secs => $4)
            RETURNING id
            ",
        )
        .bind(id)
        .bind(hash)
        .bind(request)
        .bind(ttl_secs)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::database)?;

        Ok(id)
    }

    async fn run_and_record<T, F, Fut>(&self, id: i64, handler: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match handler().await {
            Ok(response) => {
                let snapshot = serde_json::to_value(&response)?;
                sqlx::query(
                    r"
                    UPDATE audit_events
                    SET status = 'completed', response_snapshot = $2, completed_at = now()
                    WHERE id = $1
                    ",
                )
                .bind(id)
                .bind(&snapshot)
                .execute(&self.pool)
                .await
                .map_err(Error::database)?;

                metrics::counter!("seatline.idempotency.completed").increment(1);
                Ok(response)
            },
            Err(err) => {
                sqlx::query(
                    r"
                    UPDATE audit_events
                    SET status = 'failed', error_snapshot = $2, completed_at = now()
                    WHERE id = $1
                    ",
                )
                .bind(id)
                .bind(err.to_string())
                .execute(&self.pool)
                .await
                .map_err(Error::database)?;

                metrics::counter!("seatline.idempotency.failed").increment(1);
                Err(err)
            },
        }
    }
}
