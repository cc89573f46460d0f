//! Operator takeover of customer chat sessions.
//!
//! While a takeover is active the chat flow suppresses automated replies
//! for that session; the operator talks to the customer directly. The
//! partial unique index in storage guarantees a single active takeover
//! per session.

use seatline_core::{Error, OperatorId, Result};
use seatline_postgres::audit::{self, DomainEvent};
use seatline_postgres::{operators, takeovers};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::BookingServices;

/// Wire view of a takeover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TakeoverView {
    /// Takeover id.
    pub id: i64,
    /// Controlled chat session.
    pub session_id: String,
    /// Controlling operator.
    pub operator_id: i64,
    /// `active` or `released`.
    pub status: String,
}

impl From<&takeovers::TakeoverRow> for TakeoverView {
    fn from(row: &takeovers::TakeoverRow) -> Self {
        Self {
            id: row.id,
            session_id: row.session_id.clone(),
            operator_id: row.operator_id.get(),
            status: row.status.clone(),
        }
    }
}

impl BookingServices {
    /// Start a takeover of a session by an approved operator.
    ///
    /// # Errors
    ///
    /// [`Error::TakeoverAlreadyActive`] when the session is already taken
    /// over; [`Error::Validation`] for an unknown or unapproved operator;
    /// retryable infra errors otherwise.
    pub async fn start_takeover(
        &self,
        session_id: &str,
        operator_id: OperatorId,
    ) -> Result<TakeoverView> {
        let operator = operators::find_by_id(&self.pool, operator_id)
            .await?
            .ok_or_else(|| Error::Validation("unknown operator".into()))?;
        if !operator.approved {
            return Err(Error::Validation("operator is not approved".into()));
        }

        let row = takeovers::start(&self.pool, session_id, operator_id).await?;

        audit::append(
            &self.pool,
            &DomainEvent {
                source: "operator",
                event_type: "takeover_started",
                idempotency_key: row.id.to_string(),
                payload: json!({ "session_id": session_id }),
                session_id: Some(session_id),
                operator_id: Some(operator_id.get()),
            },
        )
        .await?;

        tracing::info!(session_id, operator_id = %operator_id, "takeover started");
        Ok(TakeoverView::from(&row))
    }

    /// Release the active takeover on a session (idempotent).
    ///
    /// # Errors
    ///
    /// Retryable infra errors.
    pub async fn release_takeover(&self, session_id: &str) -> Result<Option<TakeoverView>> {
        let Some(row) = takeovers::release(&self.pool, session_id).await? else {
            return Ok(None);
        };

        audit::append(
            &self.pool,
            &DomainEvent {
                source: "operator",
                event_type: "takeover_released",
                idempotency_key: row.id.to_string(),
                payload: json!({ "session_id": session_id }),
                session_id: Some(session_id),
                operator_id: Some(row.operator_id.get()),
            },
        )
        .await?;

        tracing::info!(session_id, "takeover released");
        Ok(Some(TakeoverView::from(&row)))
    }

    /// Resume a takeover: return the active one when it belongs to the
    /// same operator, otherwise start fresh.
    ///
    /// # Errors
    ///
    /// [`Error::TakeoverAlreadyActive`] when another operator holds the
    /// session; retryable infra errors otherwise.
    pub async fn resume_takeover(
        &self,
        session_id: &str,
        operator_id: OperatorId,
    ) -> Result<TakeoverView> {
        if let Some(active) = takeovers::find_active(&self.pool, session_id).await? {
            if active.operator_id == operator_id {
                return Ok(TakeoverView::from(&active));
            }
            return Err(Error::TakeoverAlreadyActive);
        }

        self.start_takeover(session_id, operator_id).await
    }

    /// Whether the session is currently taken over.
    ///
    /// # Errors
    ///
    /// Retryable infra errors.
    pub async fn takeover_active(&self, session_id: &str) -> Result<bool> {
        Ok(takeovers::find_active(&self.pool, session_id).await?.is_some())
    }
}
