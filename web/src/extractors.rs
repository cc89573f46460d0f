//! Request extractors shared by the handlers.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::error::ApiError;
use seatline_core::Error;

/// The caller-supplied `X-Idempotency-Key` header.
///
/// Required on every mutating non-webhook endpoint; webhooks derive their
/// keys from the signed payload instead.
#[derive(Debug, Clone)]
pub struct IdempotencyKey(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for IdempotencyKey
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get("x-idempotency-key")
            .ok_or_else(|| {
                ApiError::from(Error::Validation("missing X-Idempotency-Key header".into()))
            })?
            .to_str()
            .map_err(|_| {
                ApiError::from(Error::Validation("malformed X-Idempotency-Key header".into()))
            })?
            .to_string();

        if key.is_empty() || key.len() > 128 {
            return Err(ApiError::from(Error::Validation(
                "X-Idempotency-Key must be 1-128 characters".into(),
            )));
        }

        Ok(Self(key))
    }
}

/// Best-effort client IP for rate limiting.
///
/// Trusts `x-forwarded-for` (first hop) and `x-real-ip` the way the
/// upstream proxy sets them, then falls back to the socket address.
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub IpAddr);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let from_header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .and_then(|v| v.trim().parse::<IpAddr>().ok())
        };

        let ip = from_header("x-forwarded-for")
            .or_else(|| from_header("x-real-ip"))
            .or_else(|| {
                parts
                    .extensions
                    .get::<axum::extract::ConnectInfo<SocketAddr>>()
                    .map(|info| info.0.ip())
            })
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

        Ok(Self(ip))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;

    fn parts_with_headers(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn idempotency_key_required() {
        let mut parts = parts_with_headers(&[]);
        assert!(IdempotencyKey::from_request_parts(&mut parts, &()).await.is_err());

        let mut parts = parts_with_headers(&[("x-idempotency-key", "op-123")]);
        let key = IdempotencyKey::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(key.0, "op-123");
    }

    #[tokio::test]
    async fn oversized_idempotency_key_rejected() {
        let long = "k".repeat(200);
        let mut parts = parts_with_headers(&[("x-idempotency-key", long.as_str())]);
        assert!(IdempotencyKey::from_request_parts(&mut parts, &()).await.is_err());
    }

    #[tokio::test]
    async fn client_ip_prefers_forwarded_for() {
        let mut parts =
            parts_with_headers(&[("x-forwarded-for", "203.0.113.7, 10.0.0.1")]);
        let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ip.to_string(), "203.0.113.7");
    }

    #[tokio::test]
    async fn client_ip_falls_back_to_unspecified() {
        let mut parts = parts_with_headers(&[]);
        let ClientIp(ip) = ClientIp::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ip, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }
}
