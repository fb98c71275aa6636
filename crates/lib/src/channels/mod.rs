//! Messaging provider channel (WhatsApp Cloud API).
//!
//! Inbound: webhook envelope types and per-message decoding. Outbound: the
//! [`OutboundChannel`] trait the dispatcher sends through, and its WhatsApp implementation.

mod inbound;
mod whatsapp;

pub(crate) use inbound::raw_sender;
pub use inbound::{
    InboundContent, InboundError, InboundMessage, WebhookChange, WebhookChangeValue, WebhookEntry,
    WebhookEnvelope,
};
pub use whatsapp::{
    interactive_payload, text_payload, WhatsAppChannel, BUTTON_ID_PREFIX, MAX_BUTTONS,
    MAX_BUTTON_TITLE_CHARS,
};

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel not configured: {0}")]
    NotConfigured(&'static str),
    #[error("send request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("provider api error: {0}")]
    Api(String),
}

/// Sends messages to a conversation on the provider. One HTTP call per send; no retry.
#[async_trait]
pub trait OutboundChannel: Send + Sync {
    /// Send a plain text message.
    async fn send_text(&self, to: &str, body: &str) -> Result<(), ChannelError>;

    /// Send `body` with one reply button per action label; plain text when `actions` is empty.
    async fn send_interactive(&self, to: &str, body: &str, actions: &[String]) -> Result<(), ChannelError>;
}
