//! Chat-platform webhook intake.
//!
//! Pipeline: rate limit, HMAC over the raw body
//! (`x-hub-signature-256`), replay nonce (the signature itself: a
//! captured delivery replays with an identical signature), envelope
//! parsing, idempotency (key = message id + message type), then the chat
//! flow in services.
//!
//! The platform's envelope nests the message under
//! `entry[0].changes[0].value.messages[0]`; deliveries without a message
//! (status callbacks etc.) are acknowledged and ignored.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use seatline_core::{Error, Phone};
use seatline_postgres::LedgerScope;
use seatline_services::{ChatMessage, MessageKind};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::extractors::ClientIp;
use crate::signature::verify_hub_signature;
use crate::state::AppState;

const NONCE_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(default)]
    changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
struct Change {
    value: ChangeValue,
}

#[derive(Debug, Deserialize)]
struct ChangeValue {
    #[serde(default)]
    messages: Vec<RawMessage>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    id: String,
    from: String,
    #[serde(rename = "type")]
    kind: String,
    text: Option<RawText>,
    image: Option<RawMedia>,
    document: Option<RawMedia>,
}

#[derive(Debug, Deserialize)]
struct RawText {
    body: String,
}

#[derive(Debug, Deserialize)]
struct RawMedia {
    id: String,
}

fn parse_message(envelope: &Envelope) -> Option<Result<ChatMessage, Error>> {
    let raw = envelope
        .entry
        .first()?
        .changes
        .first()?
        .value
        .messages
        .first()?;

    Some(to_chat_message(raw))
}

fn to_chat_message(raw: &RawMessage) -> Result<ChatMessage, Error> {
    let kind = match raw.kind.as_str() {
        "text" => MessageKind::Text,
        "image" => MessageKind::Image,
        "document" => MessageKind::Document,
        other => {
            return Err(Error::Validation(format!("unsupported message type: {other}")))
        },
    };

    let media_id = match kind {
        MessageKind::Image => raw.image.as_ref().map(|m| m.id.clone()),
        MessageKind::Document => raw.document.as_ref().map(|m| m.id.clone()),
        MessageKind::Text => None,
    };

    Ok(ChatMessage {
        message_id: raw.id.clone(),
        from: Phone::normalize(&raw.from)?,
        kind,
        text: raw.text.as_ref().map(|t| t.body.clone()),
        media_id,
    })
}

/// `POST /webhooks/chat`
///
/// # Errors
///
/// 429 on rate limit, 401 on a bad signature, 409 on a replayed
/// delivery, 400 on a malformed envelope, 503 on infra outage.
pub async fn chat_webhook(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    state
        .rate_limiter
        .check("webhooks", state.limits.webhooks_per_minute, ip)
        .await?;

    let signature = headers
        .get("x-hub-signature-256")
        .and_then(|v| v.to_str().ok())
        .ok_or(Error::SignatureInvalid)?;
    verify_hub_signature(&state.secrets.chat_webhook, &body, signature)?;

    state.replay.register("chat", signature, NONCE_TTL).await?;

    let envelope: Envelope = serde_json::from_slice(&body)
        .map_err(|e| Error::Validation(format!("malformed webhook body: {e}")))?;

    let Some(parsed) = parse_message(&envelope) else {
        // Status callbacks and other message-less deliveries.
        return Ok(Json(json!({ "success": true, "ignored": true })));
    };
    let message = parsed?;

    let idempotency_key = format!("{}:{}", message.message_id, message.kind.as_str());
    let session_id = message.session_id();

    let services = state.services.clone();
    let response = state
        .ledger
        .with_idempotency(
            LedgerScope {
                source: "whatsapp",
                event_type: "message",
                idempotency_key: &idempotency_key,
                session_id: Some(&session_id),
                operator_id: None,
            },
            &json!({
                "message_id": message.message_id,
                "from": message.from.as_str(),
                "type": message.kind.as_str(),
            }),
            || async move { services.handle_chat_message(&message).await },
        )
        .await;

    match response {
        Ok(outcome) => Ok(Json(json!({ "success": true, "result": outcome }))),
        Err(err) => {
            // The customer gets a plain-text fallback; the platform gets
            // the error status so retryable failures are redelivered.
            if let Ok(phone) = envelope_phone(&envelope) {
                state.services.send_fallback(&phone).await;
            }
            Err(ApiError::from(err))
        },
    }
}

fn envelope_phone(envelope: &Envelope) -> Result<Phone, Error> {
    let raw = envelope
        .entry
        .first()
        .and_then(|e| e.changes.first())
        .and_then(|c| c.value.messages.first())
        .ok_or_else(|| Error::Validation("no message".into()))?;
    Phone::normalize(&raw.from)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn envelope_json(kind: &str) -> String {
        format!(
            r#"{{
                "entry": [{{
                    "changes": [{{
                        "value": {{
                            "messages": [{{
                                "id": "wamid.X1",
                                "from": "919876543210",
                                "type": "{kind}",
                                "text": {{"body": "2 seats tomorrow"}},
                                "image": {{"id": "media-9"}},
                                "document": null
                            }}]
                        }}
                    }}]
                }}]
            }}"#
        )
    }

    #[test]
    fn parses_nested_text_message() {
        let envelope: Envelope = serde_json::from_str(&envelope_json("text")).unwrap();
        let msg = parse_message(&envelope).unwrap().unwrap();
        assert_eq!(msg.message_id, "wamid.X1");
        assert_eq!(msg.kind, MessageKind::Text);
        assert_eq!(msg.text.as_deref(), Some("2 seats tomorrow"));
        assert_eq!(msg.media_id, None);
        assert_eq!(msg.from.as_str(), "+919876543210");
    }

    #[test]
    fn image_message_carries_media_id() {
        let envelope: Envelope = serde_json::from_str(&envelope_json("image")).unwrap();
        let msg = parse_message(&envelope).unwrap().unwrap();
        assert_eq!(msg.kind, MessageKind::Image);
        assert_eq!(msg.media_id.as_deref(), Some("media-9"));
    }

    #[test]
    fn unsupported_type_is_a_validation_error() {
        let envelope: Envelope = serde_json::from_str(&envelope_json("sticker")).unwrap();
        assert!(parse_message(&envelope).unwrap().is_err());
    }

    #[test]
    fn message_less_delivery_parses_to_none() {
        let envelope: Envelope =
            serde_json::from_str(r#"{"entry":[{"changes":[{"value":{"messages":[]}}]}]}"#)
                .unwrap();
        assert!(parse_message(&envelope).is_none());

        let empty: Envelope = serde_json::from_str(r"{}").unwrap();
        assert!(parse_message(&empty).is_none());
    }
}
