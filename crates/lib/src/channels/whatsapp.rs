//! WhatsApp channel: send text and reply-button messages via the Cloud API.

use crate::channels::{ChannelError, OutboundChannel};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Longest button title the provider accepts, in characters.
pub const MAX_BUTTON_TITLE_CHARS: usize = 20;
/// Most reply buttons the provider accepts on one message.
pub const MAX_BUTTONS: usize = 3;
/// Reply ids are `btn_<index>`.
pub const BUTTON_ID_PREFIX: &str = "btn_";

/// Body for a plain text message.
pub fn text_payload(to: &str, body: &str) -> Value {
    json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": to,
        "type": "text",
        "text": { "body": body },
    })
}

/// First [`MAX_BUTTON_TITLE_CHARS`] characters of a label (char-based, never splits a code point).
fn button_title(label: &str) -> String {
    label.chars().take(MAX_BUTTON_TITLE_CHARS).collect()
}

/// Non-blank labels that can become buttons, with their position in `actions`.
fn button_labels(actions: &[String]) -> impl Iterator<Item = (usize, &String)> {
    actions
        .iter()
        .enumerate()
        .filter(|(_, label)| !label.trim().is_empty())
        .take(MAX_BUTTONS)
}

/// Body for an interactive reply-button message. At most [`MAX_BUTTONS`] buttons are built,
/// blank labels are skipped, and ids keep each label's position; the full labels stay
/// readable in `body`.
pub fn interactive_payload(to: &str, body: &str, actions: &[String]) -> Value {
    let buttons: Vec<Value> = button_labels(actions)
        .map(|(i, label)| {
            json!({
                "type": "reply",
                "reply": {
                    "id": format!("{}{}", BUTTON_ID_PREFIX, i),
                    "title": button_title(label),
                },
            })
        })
        .collect();
    json!({
        "messaging_product": "whatsapp",
        "recipient_type": "individual",
        "to": to,
        "type": "interactive",
        "interactive": {
            "type": "button",
            "body": { "text": body },
            "action": { "buttons": buttons },
        },
    })
}

/// WhatsApp Cloud API connector.
pub struct WhatsAppChannel {
    token: Option<String>,
    phone_number_id: Option<String>,
    api_base: String,
    api_version: String,
    client: reqwest::Client,
}

impl WhatsAppChannel {
    pub fn new(
        token: Option<String>,
        phone_number_id: Option<String>,
        api_base: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        Self {
            token,
            phone_number_id,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_version: api_version.into().trim_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Send endpoint: `{api_base}/{api_version}/{phone_number_id}/messages`.
    pub fn messages_url(&self) -> Result<String, ChannelError> {
        let phone_number_id = self
            .phone_number_id
            .as_ref()
            .ok_or(ChannelError::NotConfigured("whatsapp phone number id"))?;
        Ok(format!(
            "{}/{}/{}/messages",
            self.api_base, self.api_version, phone_number_id
        ))
    }

    async fn post_message(&self, payload: &Value) -> Result<(), ChannelError> {
        let token = self
            .token
            .as_ref()
            .ok_or(ChannelError::NotConfigured("whatsapp access token"))?;
        let url = self.messages_url()?;
        let res = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(payload)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ChannelError::Api(format!("{} {}", status, body)));
        }
        let body = res.text().await.unwrap_or_default();
        log::debug!("whatsapp: message accepted: {}", body);
        Ok(())
    }
}

#[async_trait]
impl OutboundChannel for WhatsAppChannel {
    async fn send_text(&self, to: &str, body: &str) -> Result<(), ChannelError> {
        self.post_message(&text_payload(to, body)).await?;
        log::info!("whatsapp: text message sent to {}", to);
        Ok(())
    }

    async fn send_interactive(&self, to: &str, body: &str, actions: &[String]) -> Result<(), ChannelError> {
        let buttons = button_labels(actions).count();
        if buttons == 0 {
            return self.send_text(to, body).await;
        }
        self.post_message(&interactive_payload(to, body, actions))
            .await?;
        log::info!(
            "whatsapp: interactive message with {} button(s) sent to {}",
            buttons,
            to
        );
        Ok(())
    }
}
