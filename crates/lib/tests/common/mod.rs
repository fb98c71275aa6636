//! Shared helpers for integration tests: stub model backend, recording outbound channel,
//! a gateway started on a free port, and a mock upstream HTTP server that captures requests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Bytes,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    Json, Router,
};
use relay::channels::{ChannelError, OutboundChannel};
use relay::config::{Config, PipelineMode};
use relay::gateway::{self, GatewayState};
use relay::llm::{ChatMessage, ChatResponse, LlmBackend, LlmError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub const SCRIPTED_REPLY: &str = "Hi!\n- Tell me more\n- Ask something else\n- Never mind";
pub const VERIFY_TOKEN: &str = "verify-secret";

pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind free port");
    listener.local_addr().expect("local_addr").port()
}

/// Always answers with [`SCRIPTED_REPLY`].
pub struct ScriptedBackend;

#[async_trait]
impl LlmBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, _model: &str, _messages: Vec<ChatMessage>) -> Result<ChatResponse, LlmError> {
        Ok(ChatResponse {
            content: SCRIPTED_REPLY.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text { to: String, body: String },
    Interactive { to: String, body: String, actions: Vec<String> },
}

/// Records every send; fails them all when `fail` is set.
#[derive(Default)]
pub struct RecordingChannel {
    pub sent: Mutex<Vec<Sent>>,
    pub fail: bool,
}

impl RecordingChannel {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    fn result(&self) -> Result<(), ChannelError> {
        if self.fail {
            Err(ChannelError::Api("400 Bad Request".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl OutboundChannel for RecordingChannel {
    async fn send_text(&self, to: &str, body: &str) -> Result<(), ChannelError> {
        self.sent.lock().await.push(Sent::Text {
            to: to.to_string(),
            body: body.to_string(),
        });
        self.result()
    }

    async fn send_interactive(&self, to: &str, body: &str, actions: &[String]) -> Result<(), ChannelError> {
        self.sent.lock().await.push(Sent::Interactive {
            to: to.to_string(),
            body: body.to_string(),
            actions: actions.to_vec(),
        });
        self.result()
    }
}

pub fn test_config(port: u16) -> Config {
    let mut config = Config::default();
    config.gateway.port = port;
    config.gateway.bind = "127.0.0.1".to_string();
    config.whatsapp.verify_token = Some(VERIFY_TOKEN.to_string());
    config.agents.pipeline = PipelineMode::SingleStage;
    config.replies.auto_respond_message = "Check out our new offers!".to_string();
    config
}

pub struct TestGateway {
    pub base_url: String,
    pub channel: Arc<RecordingChannel>,
    pub client: reqwest::Client,
}

/// Start the gateway with the scripted backend and wait until `GET /` answers.
pub async fn start_gateway(channel: RecordingChannel, admin_token: Option<&str>) -> TestGateway {
    let port = free_port();
    let channel = Arc::new(channel);
    let mut state = GatewayState::new(test_config(port), Arc::new(ScriptedBackend), channel.clone());
    state.admin_token = admin_token.map(str::to_string);
    tokio::spawn(async move {
        let _ = gateway::serve(state).await;
    });

    let base_url = format!("http://127.0.0.1:{}", port);
    let client = reqwest::Client::new();
    for _ in 0..100 {
        if let Ok(resp) = client.get(format!("{}/", base_url)).send().await {
            if resp.status().is_success() {
                return TestGateway {
                    base_url,
                    channel,
                    client,
                };
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("gateway on {} did not come up within 5s", base_url);
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Envelope with one `messages` change per entry.
pub fn envelope(entries: Vec<Vec<serde_json::Value>>) -> serde_json::Value {
    let entry: Vec<serde_json::Value> = entries
        .into_iter()
        .map(|messages| {
            serde_json::json!({
                "id": "waba-1",
                "changes": [ { "field": "messages", "value": { "messaging_product": "whatsapp", "messages": messages } } ]
            })
        })
        .collect();
    serde_json::json!({ "object": "whatsapp_business_account", "entry": entry })
}

pub fn text_message(from: &str, body: &str) -> serde_json::Value {
    serde_json::json!({ "from": from, "id": "wamid.test", "type": "text", "text": { "body": body } })
}

/// One request seen by [`MockUpstream`].
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub body: serde_json::Value,
}

/// Answers every request with a fixed status and JSON body and records what it received.
pub struct MockUpstream {
    pub base_url: String,
    pub requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

pub async fn start_mock_upstream(status: StatusCode, response: serde_json::Value) -> MockUpstream {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let captured = requests.clone();
    let app = Router::new().fallback(move |method: Method, uri: Uri, headers: HeaderMap, body: Bytes| {
        let captured = captured.clone();
        let response = response.clone();
        async move {
            captured.lock().await.push(CapturedRequest {
                method,
                path: uri.path().to_string(),
                authorization: headers
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
                body: serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null),
            });
            (status, Json(response))
        }
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock upstream");
    let port = listener.local_addr().expect("local_addr").port();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    MockUpstream {
        base_url: format!("http://127.0.0.1:{}", port),
        requests,
    }
}

impl MockUpstream {
    pub async fn only_request(&self) -> CapturedRequest {
        let requests = self.requests.lock().await;
        assert_eq!(requests.len(), 1, "expected exactly one upstream request");
        requests[0].clone()
    }
}
