//! Chat-side flow: message logging, takeover routing and operator
//! ticket intake.
//!
//! Free-form customer booking text is handled elsewhere (outside this
//! core); what the core owns is the bookkeeping around every inbound
//! message, the takeover gate, and the one chat interaction with
//! lifecycle consequences: an approved operator sending a ticket image or
//! document, which confirms their most recent active hold.
//!
//! Outbound messaging is an external collaborator behind [`ChatClient`];
//! a send failure never fails the webhook, the customer just gets no
//! reply.

use std::pin::Pin;

use seatline_core::{Phone, Result};
use seatline_postgres::message_logs::{self, Direction, NewMessageLog};
use seatline_postgres::operators;
use serde::{Deserialize, Serialize};

use crate::tickets::TicketRequest;
use crate::BookingServices;

/// Outbound chat messaging contract.
///
/// Returns a boxed future so implementations stay object-safe behind
/// `Arc<dyn ChatClient>`.
pub trait ChatClient: Send + Sync {
    /// Send a plain-text message to a phone.
    fn send_text<'a>(
        &'a self,
        to: &'a Phone,
        body: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Chat client that only logs; used in development and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingChatClient;

impl ChatClient for TracingChatClient {
    fn send_text<'a>(
        &'a self,
        to: &'a Phone,
        body: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            tracing::info!(to = %to, body, "outbound chat message (not sent)");
            Ok(())
        })
    }
}

/// Kind of an inbound chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Plain text.
    Text,
    /// Image attachment.
    Image,
    /// Document attachment.
    Document,
}

impl MessageKind {
    /// Provider string for the message log.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Document => "document",
        }
    }
}

/// An inbound chat message after envelope parsing.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    /// Provider message id.
    pub message_id: String,
    /// Sender phone, normalized.
    pub from: Phone,
    /// Message kind.
    pub kind: MessageKind,
    /// Text body for text messages.
    pub text: Option<String>,
    /// Provider media id for attachments.
    pub media_id: Option<String>,
}

impl ChatMessage {
    /// The chat session a message belongs to (one session per phone).
    #[must_use]
    pub fn session_id(&self) -> String {
        format!("wa:{}", self.from)
    }
}

/// What the chat handler did with a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ChatHandleResponse {
    /// Automated replies are suppressed; an operator owns the session.
    Suppressed,
    /// An operator ticket confirmed a booking.
    TicketConfirmed {
        /// The confirmed booking.
        booking_id: i64,
    },
    /// Message was logged and acknowledged.
    Acknowledged,
}

impl BookingServices {
    /// Handle a verified inbound chat message.
    ///
    /// # Errors
    ///
    /// Retryable infra errors; domain rejections inside ticket
    /// confirmation degrade to a fallback reply rather than failing the
    /// webhook.
    pub async fn handle_chat_message(&self, msg: &ChatMessage) -> Result<ChatHandleResponse> {
        let session_id = msg.session_id();

        message_logs::append(
            &self.pool,
            &NewMessageLog {
                session_id: Some(&session_id),
                direction: Direction::Inbound,
                customer_phone: Some(msg.from.as_str()),
                message_id: Some(&msg.message_id),
                message_type: Some(msg.kind.as_str()),
                body: msg.text.as_deref(),
            },
        )
        .await?;

        if self.takeover_active(&session_id).await? {
            tracing::debug!(session_id, "automated reply suppressed, takeover active");
            return Ok(ChatHandleResponse::Suppressed);
        }

        if let (MessageKind::Image | MessageKind::Document, Some(media_id)) =
            (msg.kind, msg.media_id.as_deref())
        {
            if let Some(operator) = operators::find_by_phone(&self.pool, &msg.from).await? {
                if operator.approved {
                    return self.confirm_ticket_from_chat(msg, &operator, media_id).await;
                }
            }
        }

        self.reply(
            &msg.from,
            &session_id,
            "Thanks! An agent will get back to you shortly.",
        )
        .await;
        Ok(ChatHandleResponse::Acknowledged)
    }

    async fn confirm_ticket_from_chat(
        &self,
        msg: &ChatMessage,
        operator: &operators::OperatorRow,
        media_id: &str,
    ) -> Result<ChatHandleResponse> {
        let ticket = TicketRequest {
            provider_media_id: media_id.to_string(),
            media_kind: msg.kind.as_str().to_string(),
        };

        match self.confirm_with_ticket(operator, &ticket).await {
            Ok(confirmed) => {
                self.reply(
                    &msg.from,
                    &msg.session_id(),
                    &format!("Booking #{} confirmed.", confirmed.booking.id),
                )
                .await;
                Ok(ChatHandleResponse::TicketConfirmed {
                    booking_id: confirmed.booking.id,
                })
            },
            Err(err) if !err.is_retryable() => {
                tracing::warn!(error = %err, "ticket confirmation rejected");
                self.reply(
                    &msg.from,
                    &msg.session_id(),
                    "No active hold found for this ticket.",
                )
                .await;
                Ok(ChatHandleResponse::Acknowledged)
            },
            Err(err) => Err(err),
        }
    }

    /// Best-effort fallback text when a chat handler fails.
    pub async fn send_fallback(&self, to: &Phone) {
        self.reply(
            to,
            &format!("wa:{to}"),
            "Something went wrong, please try again later.",
        )
        .await;
    }

    /// Send and log an outbound reply; failures are logged only.
    async fn reply(&self, to: &Phone, session_id: &str, body: &str) {
        if let Err(err) = self.chat_client.send_text(to, body).await {
            tracing::warn!(to = %to, error = %err, "outbound chat send failed");
        }

        if let Err(err) = message_logs::append(
            &self.pool,
            &NewMessageLog {
                session_id: Some(session_id),
                direction: Direction::Outbound,
                customer_phone: Some(to.as_str()),
                message_id: None,
                message_type: Some("text"),
                body: Some(body),
            },
        )
        .await
        {
            tracing::warn!(error = %err, "failed to log outbound message");
        }
    }
}
