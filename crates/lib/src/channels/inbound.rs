//! Inbound webhook payloads: the provider's nested envelope and per-message decoding.
//!
//! The envelope is decoded up front; individual messages stay as raw JSON until the
//! dispatcher handles them, so one malformed message cannot fail the whole delivery.

use serde::Deserialize;
use serde_json::Value;

/// `{ object, entry: [...] }` POSTed to the webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    #[serde(default)]
    pub object: Option<String>,
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub value: WebhookChangeValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookChangeValue {
    /// Absent for status callbacks (delivered/read receipts).
    #[serde(default)]
    pub messages: Vec<Value>,
}

impl WebhookEnvelope {
    /// Every raw message of every `messages` change, in document order.
    pub fn messages(&self) -> impl Iterator<Item = &Value> {
        self.entry
            .iter()
            .flat_map(|e| e.changes.iter())
            .filter(|c| c.field == "messages")
            .flat_map(|c| c.value.messages.iter())
    }
}

/// What the sender sent.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundContent {
    Text(String),
    /// A tap on a reply button (interactive `button_reply`, or a template quick-reply `button`).
    ButtonReply { id: String, title: Option<String> },
    /// Any other message type (image, audio, location, ...).
    Unsupported(String),
}

/// One decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub from: String,
    pub id: Option<String>,
    pub content: InboundContent,
}

#[derive(Debug, thiserror::Error)]
pub enum InboundError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("{0} message without {1}")]
    MissingPayload(&'static str, &'static str),
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    from: String,
    #[serde(rename = "type")]
    typ: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    text: Option<RawText>,
    #[serde(default)]
    interactive: Option<RawInteractive>,
    #[serde(default)]
    button: Option<RawButton>,
}

#[derive(Debug, Deserialize)]
struct RawText {
    body: String,
}

#[derive(Debug, Deserialize)]
struct RawInteractive {
    #[serde(rename = "type")]
    typ: String,
    #[serde(default)]
    button_reply: Option<RawButtonReply>,
}

#[derive(Debug, Deserialize)]
struct RawButtonReply {
    id: String,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawButton {
    payload: String,
    #[serde(default)]
    text: Option<String>,
}

impl InboundMessage {
    /// Decode one raw message from the envelope.
    pub fn parse(value: &Value) -> Result<Self, InboundError> {
        let raw: RawMessage = serde_json::from_value(value.clone())?;
        let content = match raw.typ.as_str() {
            "text" => {
                let text = raw.text.ok_or(InboundError::MissingPayload("text", "text.body"))?;
                InboundContent::Text(text.body)
            }
            "interactive" => match raw.interactive {
                Some(RawInteractive {
                    typ,
                    button_reply: Some(reply),
                }) if typ == "button_reply" => InboundContent::ButtonReply {
                    id: reply.id,
                    title: reply.title,
                },
                Some(RawInteractive { typ, .. }) => InboundContent::Unsupported(format!("interactive/{}", typ)),
                None => return Err(InboundError::MissingPayload("interactive", "interactive")),
            },
            "button" => {
                let button = raw.button.ok_or(InboundError::MissingPayload("button", "button.payload"))?;
                InboundContent::ButtonReply {
                    id: button.payload,
                    title: button.text,
                }
            }
            other => InboundContent::Unsupported(other.to_string()),
        };
        Ok(Self {
            from: raw.from,
            id: raw.id,
            content,
        })
    }

    /// Text handed to the model: the button reply id for button taps, the body for text.
    /// None for unsupported types.
    pub fn input(&self) -> Option<&str> {
        match &self.content {
            InboundContent::ButtonReply { id, .. } => Some(id.as_str()),
            InboundContent::Text(body) => Some(body.as_str()),
            InboundContent::Unsupported(_) => None,
        }
    }
}

/// Best-effort sender of a raw message, for error reports.
pub(crate) fn raw_sender(value: &Value) -> Option<String> {
    value.get("from").and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn messages_flatten_across_entries_and_skip_status_changes() {
        let envelope: WebhookEnvelope = serde_json::from_value(json!({
            "object": "whatsapp_business_account",
            "entry": [
                { "changes": [
                    { "field": "messages", "value": { "messages": [ { "from": "1" }, { "from": "2" } ] } },
                    { "field": "messages", "value": { "statuses": [ { "status": "read" } ] } }
                ] },
                { "changes": [
                    { "field": "account_update", "value": { "messages": [ { "from": "x" } ] } },
                    { "field": "messages", "value": { "messages": [ { "from": "3" } ] } }
                ] }
            ]
        }))
        .unwrap();
        let senders: Vec<&str> = envelope
            .messages()
            .filter_map(|m| m["from"].as_str())
            .collect();
        assert_eq!(senders, vec!["1", "2", "3"]);
    }

    #[test]
    fn envelope_without_entry_is_rejected() {
        assert!(serde_json::from_value::<WebhookEnvelope>(json!({ "object": "x" })).is_err());
        assert!(serde_json::from_value::<WebhookEnvelope>(json!({ "entry": "nope" })).is_err());
    }

    #[test]
    fn parses_text_message() {
        let msg = InboundMessage::parse(&json!({
            "from": "123", "id": "wamid.1", "type": "text", "text": { "body": "hello" }
        }))
        .unwrap();
        assert_eq!(msg.from, "123");
        assert_eq!(msg.id.as_deref(), Some("wamid.1"));
        assert_eq!(msg.content, InboundContent::Text("hello".to_string()));
        assert_eq!(msg.input(), Some("hello"));
    }

    #[test]
    fn button_reply_id_is_the_input() {
        let msg = InboundMessage::parse(&json!({
            "from": "123", "type": "interactive",
            "interactive": { "type": "button_reply", "button_reply": { "id": "btn_1", "title": "Ask something" } }
        }))
        .unwrap();
        assert_eq!(msg.input(), Some("btn_1"));

        let msg = InboundMessage::parse(&json!({
            "from": "123", "type": "button", "button": { "payload": "promo", "text": "Yes" }
        }))
        .unwrap();
        assert_eq!(msg.input(), Some("promo"));
    }

    #[test]
    fn other_types_are_unsupported_not_errors() {
        let msg = InboundMessage::parse(&json!({
            "from": "123", "type": "image", "image": { "id": "media-1" }
        }))
        .unwrap();
        assert_eq!(msg.content, InboundContent::Unsupported("image".to_string()));
        assert_eq!(msg.input(), None);

        let msg = InboundMessage::parse(&json!({
            "from": "123", "type": "interactive", "interactive": { "type": "list_reply" }
        }))
        .unwrap();
        assert_eq!(msg.content, InboundContent::Unsupported("interactive/list_reply".to_string()));
    }

    #[test]
    fn malformed_messages_are_errors() {
        assert!(InboundMessage::parse(&json!({ "type": "text", "text": { "body": "x" } })).is_err());
        assert!(matches!(
            InboundMessage::parse(&json!({ "from": "1", "type": "text" })),
            Err(InboundError::MissingPayload(..))
        ));
        assert_eq!(raw_sender(&json!({ "from": "1", "type": "text" })).as_deref(), Some("1"));
        assert_eq!(raw_sender(&json!(42)), None);
    }
}
