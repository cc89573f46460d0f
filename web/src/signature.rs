//! HMAC signature verification for the intake surfaces.
//!
//! Three schemes, all HMAC-SHA256 with constant-time comparison:
//!
//! - **Chat webhook**: `x-hub-signature-256: sha256=<hex>` over the raw
//!   body.
//! - **Payment webhook**: `<hex>` over `"{timestamp}.{raw_body}"`, with
//!   the timestamp bounded to a tolerance window against replayed
//!   captures.
//! - **Booking token**: `<hex>` over the decimal booking id under a
//!   service secret; handed to customers at confirmation time and
//!   required for customer-initiated cancellation.

use hmac::{Hmac, Mac};
use seatline_core::{BookingId, Error, Result};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Tolerance window for payment webhook timestamps.
pub const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

fn hmac_hex(secret: &str, message: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Validation(format!("invalid HMAC key: {e}")))?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn constant_time_hex_eq(expected: &str, presented: &str) -> bool {
    constant_time_eq::constant_time_eq(expected.as_bytes(), presented.as_bytes())
}

/// Compute the chat-webhook signature header value for a body.
///
/// # Errors
///
/// Returns [`Error::Validation`] for an unusable secret.
pub fn hub_signature(secret: &str, body: &[u8]) -> Result<String> {
    Ok(format!("sha256={}", hmac_hex(secret, body)?))
}

/// Verify a chat-webhook signature header.
///
/// # Errors
///
/// Returns [`Error::SignatureInvalid`] on mismatch or a malformed
/// header.
pub fn verify_hub_signature(secret: &str, body: &[u8], header: &str) -> Result<()> {
    let presented = header
        .strip_prefix("sha256=")
        .ok_or(Error::SignatureInvalid)?;
    let expected = hmac_hex(secret, body)?;

    if constant_time_hex_eq(&expected, presented) {
        Ok(())
    } else {
        Err(Error::SignatureInvalid)
    }
}

/// Compute the payment-webhook signature for a timestamp and body.
///
/// # Errors
///
/// Returns [`Error::Validation`] for an unusable secret.
pub fn timestamped_signature(secret: &str, timestamp: &str, body: &[u8]) -> Result<String> {
    let mut message = Vec::with_capacity(timestamp.len() + 1 + body.len());
    message.extend_from_slice(timestamp.as_bytes());
    message.push(b'.');
    message.extend_from_slice(body);
    hmac_hex(secret, &message)
}

/// Verify a payment-webhook signature with its timestamp bound.
///
/// # Errors
///
/// Returns [`Error::SignatureInvalid`] on mismatch, a malformed
/// timestamp, or a timestamp outside the tolerance window around
/// `now_unix`.
pub fn verify_timestamped_signature(
    secret: &str,
    timestamp: &str,
    body: &[u8],
    presented: &str,
    now_unix: i64,
) -> Result<()> {
    let ts: i64 = timestamp.parse().map_err(|_| Error::SignatureInvalid)?;
    if (now_unix - ts).abs() > TIMESTAMP_TOLERANCE_SECS {
        return Err(Error::SignatureInvalid);
    }

    let expected = timestamped_signature(secret, timestamp, body)?;
    if constant_time_hex_eq(&expected, presented) {
        Ok(())
    } else {
        Err(Error::SignatureInvalid)
    }
}

/// The per-booking cancellation token handed to customers.
///
/// # Errors
///
/// Returns [`Error::Validation`] for an unusable secret.
pub fn booking_token(secret: &str, booking_id: BookingId) -> Result<String> {
    hmac_hex(secret, booking_id.to_string().as_bytes())
}

/// Verify a customer-presented booking token.
///
/// # Errors
///
/// Returns [`Error::SignatureInvalid`] on mismatch.
pub fn verify_booking_token(secret: &str, booking_id: BookingId, presented: &str) -> Result<()> {
    let expected = booking_token(secret, booking_id)?;
    if constant_time_hex_eq(&expected, presented) {
        Ok(())
    } else {
        Err(Error::SignatureInvalid)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn hub_signature_round_trip() {
        let body = br#"{"entry":[]}"#;
        let header = hub_signature(SECRET, body).unwrap();
        assert!(header.starts_with("sha256="));
        verify_hub_signature(SECRET, body, &header).unwrap();
    }

    #[test]
    fn hub_signature_rejects_tampering() {
        let header = hub_signature(SECRET, b"original").unwrap();
        assert!(verify_hub_signature(SECRET, b"tampered", &header).is_err());
        assert!(verify_hub_signature("other-secret", b"original", &header).is_err());
        assert!(verify_hub_signature(SECRET, b"original", "no-prefix").is_err());
    }

    #[test]
    fn timestamped_signature_round_trip() {
        let now = 1_700_000_000i64;
        let ts = now.to_string();
        let body = br#"{"gateway_event_id":"gw-1"}"#;
        let sig = timestamped_signature(SECRET, &ts, body).unwrap();
        verify_timestamped_signature(SECRET, &ts, body, &sig, now).unwrap();
    }

    #[test]
    fn timestamped_signature_rejects_stale_timestamps() {
        let now = 1_700_000_000i64;
        let stale = (now - TIMESTAMP_TOLERANCE_SECS - 1).to_string();
        let body = b"{}";
        let sig = timestamped_signature(SECRET, &stale, body).unwrap();
        assert!(verify_timestamped_signature(SECRET, &stale, body, &sig, now).is_err());

        // Future timestamps beyond tolerance are equally invalid.
        let future = (now + TIMESTAMP_TOLERANCE_SECS + 1).to_string();
        let sig = timestamped_signature(SECRET, &future, body).unwrap();
        assert!(verify_timestamped_signature(SECRET, &future, body, &sig, now).is_err());
    }

    #[test]
    fn timestamp_must_bind_the_signature() {
        let now = 1_700_000_000i64;
        let body = b"{}";
        let sig = timestamped_signature(SECRET, &now.to_string(), body).unwrap();
        // Same body, different (still fresh) timestamp: signature no
        // longer matches.
        let other_ts = (now + 10).to_string();
        assert!(verify_timestamped_signature(SECRET, &other_ts, body, &sig, now).is_err());
    }

    #[test]
    fn booking_token_round_trip() {
        let id = BookingId::new(42);
        let token = booking_token(SECRET, id).unwrap();
        verify_booking_token(SECRET, id, &token).unwrap();
        assert!(verify_booking_token(SECRET, BookingId::new(43), &token).is_err());
        assert!(verify_booking_token("other", id, &token).is_err());
    }
}
