//! Webhook dispatch: verification handshake and per-message routing.
//!
//! Each message of a delivery is handled on its own: auto-respond override (checked first,
//! whatever the message type), unsupported notice, or a model reply. Failures are reported
//! in that message's outcome and never stop the remaining messages.

use crate::auto_respond::AutoRespondStore;
use crate::channels::{
    raw_sender, ChannelError, InboundContent, InboundMessage, OutboundChannel, WebhookEnvelope,
};
use crate::config::RepliesConfig;
use crate::responder::Responder;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// `hub.mode` value the provider sends when subscribing the webhook.
pub const SUBSCRIBE_MODE: &str = "subscribe";

/// Returns the challenge to echo when mode is `subscribe` and the token matches the
/// configured secret; None (forbidden) otherwise, including when no secret is configured.
pub fn verify_subscription(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
    expected_token: Option<&str>,
) -> Option<String> {
    let expected = expected_token.filter(|t| !t.is_empty())?;
    if mode != Some(SUBSCRIBE_MODE) || token != Some(expected) {
        return None;
    }
    challenge.filter(|c| !c.is_empty()).map(str::to_string)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageStatus {
    Replied,
    AutoResponded,
    Unsupported,
    Error,
}

/// Result summary for one message of a delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub status: MessageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// True when the apology text was sent instead of a model reply.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
    /// Whether the provider accepted the outbound message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MessageOutcome {
    fn sent(from: &str, status: MessageStatus, reply: &str, delivered: bool) -> Self {
        Self {
            from: Some(from.to_string()),
            status,
            reply: Some(reply.to_string()),
            actions: Vec::new(),
            reasoning: None,
            fallback: false,
            delivered: Some(delivered),
            error: None,
        }
    }

    fn failed(from: Option<String>, error: impl Into<String>) -> Self {
        Self {
            from,
            status: MessageStatus::Error,
            reply: None,
            actions: Vec::new(),
            reasoning: None,
            fallback: false,
            delivered: None,
            error: Some(error.into()),
        }
    }
}

pub struct Dispatcher {
    responder: Arc<Responder>,
    auto_respond: Arc<AutoRespondStore>,
    channel: Arc<dyn OutboundChannel>,
    replies: RepliesConfig,
}

/// Log a send failure and turn the result into a delivered flag.
fn delivered(result: Result<(), ChannelError>, to: &str) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            log::error!("dispatch: sending reply to {} failed: {}", to, e);
            false
        }
    }
}

impl Dispatcher {
    pub fn new(
        responder: Arc<Responder>,
        auto_respond: Arc<AutoRespondStore>,
        channel: Arc<dyn OutboundChannel>,
        replies: RepliesConfig,
    ) -> Self {
        Self {
            responder,
            auto_respond,
            channel,
            replies,
        }
    }

    /// Handle every message of the delivery in document order; one outcome per message.
    pub async fn dispatch(&self, envelope: &WebhookEnvelope) -> Vec<MessageOutcome> {
        let mut outcomes = Vec::new();
        for raw in envelope.messages() {
            outcomes.push(self.handle_raw(raw).await);
        }
        log::info!("dispatch: processed {} message(s)", outcomes.len());
        outcomes
    }

    /// Decode and handle one raw message; decoding failures become an error outcome.
    pub async fn handle_raw(&self, raw: &Value) -> MessageOutcome {
        match InboundMessage::parse(raw) {
            Ok(msg) => self.handle_message(msg).await,
            Err(e) => {
                log::warn!("dispatch: skipping message: {}", e);
                MessageOutcome::failed(raw_sender(raw), e.to_string())
            }
        }
    }

    pub async fn handle_message(&self, msg: InboundMessage) -> MessageOutcome {
        log::info!("dispatch: received {:?} from {}", msg.content, msg.from);

        if self.auto_respond.get(&msg.from).await {
            log::info!("dispatch: auto-respond enabled for {}, skipping model", msg.from);
            let text = &self.replies.auto_respond_message;
            let ok = delivered(self.channel.send_text(&msg.from, text).await, &msg.from);
            return MessageOutcome::sent(&msg.from, MessageStatus::AutoResponded, text, ok);
        }

        let Some(input) = msg.input() else {
            let kind = match &msg.content {
                InboundContent::Unsupported(kind) => kind.as_str(),
                _ => "unknown",
            };
            log::info!("dispatch: unsupported message type {} from {}", kind, msg.from);
            let text = &self.replies.unsupported_message;
            let ok = delivered(self.channel.send_text(&msg.from, text).await, &msg.from);
            return MessageOutcome::sent(&msg.from, MessageStatus::Unsupported, text, ok);
        };

        let reply = self.responder.respond(&msg.from, input).await;
        let ok = delivered(
            self.channel
                .send_interactive(&msg.from, &reply.text, &reply.actions)
                .await,
            &msg.from,
        );
        MessageOutcome {
            actions: reply.actions,
            reasoning: reply.reasoning,
            fallback: reply.fallback,
            ..MessageOutcome::sent(&msg.from, MessageStatus::Replied, &reply.text, ok)
        }
    }
}
