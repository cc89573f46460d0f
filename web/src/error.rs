//! HTTP rendering of the shared error taxonomy.
//!
//! External actors see structured JSON
//! `{"success":false,"error":CODE,"details":…}` and nothing else; stack
//! traces and driver messages stay in the logs.
//!
//! Infrastructure failures render as 503 `RETRY_LATER` on every surface
//! except the inventory endpoints, whose contract reports them as 500
//! (see [`ApiError::inventory`]).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use seatline_core::Error;
use serde::Serialize;

/// Wrapper giving [`seatline_core::Error`] an HTTP shape.
#[derive(Debug)]
pub struct ApiError {
    error: Error,
    /// Status used for infrastructure failures. 503 everywhere, 500 on
    /// the inventory surface.
    infra_status: StatusCode,
}

impl ApiError {
    /// Wrap an error for the inventory surface, whose infra failures
    /// report 500 instead of 503.
    #[must_use]
    pub const fn inventory(error: Error) -> Self {
        Self {
            error,
            infra_status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self {
            error,
            infra_status: StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

/// HTTP status for each error, per the surface contract.
fn status_for(err: &Error, infra_status: StatusCode) -> StatusCode {
    match err {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::SignatureInvalid => StatusCode::UNAUTHORIZED,
        Error::BookingOwnershipInvalid => StatusCode::FORBIDDEN,
        Error::BookingNotFound(_) | Error::TripNotFound => StatusCode::NOT_FOUND,
        Error::BookingNotConfirmed { .. }
        | Error::BookingLocked
        | Error::SeatAlreadyConfirmed { .. }
        | Error::SeatsUnavailable { .. }
        | Error::DisallowedTransition { .. }
        | Error::OverRefund { .. }
        | Error::TakeoverAlreadyActive
        | Error::ReplayDetected
        | Error::DuplicateInFlight => StatusCode::CONFLICT,
        Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        Error::Database(_) | Error::LockStore(_) | Error::CircuitOpen => infra_status,
        Error::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Whether the error message is safe to echo to the caller.
const fn expose_details(err: &Error) -> bool {
    !matches!(
        err,
        Error::Database(_) | Error::LockStore(_) | Error::Serialization(_)
    )
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.error, self.infra_status);

        if status.is_server_error() {
            tracing::error!(error = %self.error, code = self.error.code(), "request failed");
        } else {
            tracing::debug!(error = %self.error, code = self.error.code(), "request rejected");
        }

        metrics::counter!("seatline.http.errors", "code" => self.error.code()).increment(1);

        let body = ErrorBody {
            success: false,
            error: self.error.code(),
            details: expose_details(&self.error).then(|| self.error.to_string()),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seatline_core::{BookingId, BookingStatus};

    const DEFAULT_INFRA: StatusCode = StatusCode::SERVICE_UNAVAILABLE;

    #[test]
    fn domain_errors_map_to_specific_4xx() {
        assert_eq!(
            status_for(&Error::BookingNotFound(BookingId::new(1)), DEFAULT_INFRA),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&Error::BookingOwnershipInvalid, DEFAULT_INFRA),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_for(
                &Error::BookingNotConfirmed {
                    status: BookingStatus::Hold
                },
                DEFAULT_INFRA
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&Error::SignatureInvalid, DEFAULT_INFRA),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_for(&Error::RateLimited { retry_after_secs: 30 }, DEFAULT_INFRA),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn infra_errors_are_503_by_default() {
        assert_eq!(
            status_for(&Error::Database("down".into()), DEFAULT_INFRA),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&Error::CircuitOpen, DEFAULT_INFRA),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn inventory_infra_errors_are_500() {
        let err = ApiError::inventory(Error::Database("down".into()));
        assert_eq!(
            status_for(&err.error, err.infra_status),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let err = ApiError::inventory(Error::CircuitOpen);
        assert_eq!(
            status_for(&err.error, err.infra_status),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        // Domain rejections keep their specific statuses on the
        // inventory surface too.
        let err = ApiError::inventory(Error::SeatAlreadyConfirmed { seats: vec![1] });
        assert_eq!(
            status_for(&err.error, err.infra_status),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn duplicate_in_flight_is_conflict_retry_later() {
        assert_eq!(
            status_for(&Error::DuplicateInFlight, DEFAULT_INFRA),
            StatusCode::CONFLICT
        );
        assert_eq!(Error::DuplicateInFlight.code(), "RETRY_LATER");
    }

    #[test]
    fn driver_messages_are_not_exposed() {
        assert!(!expose_details(&Error::Database("secret dsn".into())));
        assert!(expose_details(&Error::BookingOwnershipInvalid));
    }
}
