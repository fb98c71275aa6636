//! Admin API under `/api`: inspect conversations, send manual messages, toggle
//! auto-respond, and view model invocations.

use crate::gateway::server::GatewayState;
use crate::session::{Turn, TurnRole};
use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub(crate) fn routes(state: GatewayState) -> Router<GatewayState> {
    Router::new()
        .route("/chat-list", get(chat_list))
        .route("/messages", post(send_message))
        .route("/messages/:phone_number", get(messages))
        .route("/llm-monitoring", get(llm_monitoring))
        .route("/llm-visualization", get(llm_visualization))
        .route("/toggle/auto-respond", post(toggle_auto_respond))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Enforce `Authorization: Bearer <token>` when an admin token is configured.
async fn require_admin_token(State(state): State<GatewayState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.admin_token.as_deref() else {
        return next.run(request).await;
    };
    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);
    if provided != Some(expected) {
        log::warn!("admin: rejected unauthorized request to {}", request.uri().path());
        return error(StatusCode::UNAUTHORIZED, "unauthorized");
    }
    next.run(request).await
}

/// GET /api/chat-list: every conversation with a session, sorted.
async fn chat_list(State(state): State<GatewayState>) -> Json<Value> {
    Json(json!({ "phoneNumbers": state.sessions.ids().await }))
}

#[derive(Debug, Serialize)]
struct MessageView {
    role: &'static str,
    /// "human" for inbound turns, "AI" for replies.
    sender: &'static str,
    content: String,
    timestamp: DateTime<Utc>,
}

impl From<Turn> for MessageView {
    fn from(turn: Turn) -> Self {
        let (role, sender) = match turn.role {
            TurnRole::Inbound => ("inbound", "human"),
            TurnRole::Outbound => ("outbound", "AI"),
        };
        Self {
            role,
            sender,
            content: turn.content,
            timestamp: turn.timestamp,
        }
    }
}

/// GET /api/messages/:phone_number: session history, oldest first.
async fn messages(State(state): State<GatewayState>, Path(phone_number): Path<String>) -> Response {
    if !state.sessions.contains(&phone_number).await {
        return error(StatusCode::NOT_FOUND, "No messages found for this phone number.");
    }
    let messages: Vec<MessageView> = state
        .sessions
        .get(&phone_number)
        .await
        .into_iter()
        .map(MessageView::from)
        .collect();
    Json(json!({ "messages": messages })).into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageBody {
    #[serde(default)]
    phone_number: Option<String>,
    #[serde(default)]
    message_content: Option<String>,
}

/// POST /api/messages: send a manual text message. Not recorded in the session.
async fn send_message(State(state): State<GatewayState>, body: Result<Json<SendMessageBody>, JsonRejection>) -> Response {
    let Ok(Json(body)) = body else {
        return error(StatusCode::BAD_REQUEST, "phoneNumber and messageContent are required.");
    };
    let phone_number = body.phone_number.as_deref().map(str::trim).unwrap_or("");
    let content = body.message_content.as_deref().unwrap_or("");
    if phone_number.is_empty() || content.trim().is_empty() {
        return error(StatusCode::BAD_REQUEST, "phoneNumber and messageContent are required.");
    }
    match state.channel.send_text(phone_number, content).await {
        Ok(()) => {
            log::info!("admin: manual message sent to {}", phone_number);
            Json(json!({ "status": "Message sent successfully." })).into_response()
        }
        Err(e) => {
            log::error!("admin: manual message to {} failed: {}", phone_number, e);
            error(StatusCode::BAD_GATEWAY, "Failed to send message.")
        }
    }
}

/// GET /api/llm-monitoring: logged model invocations, oldest first.
async fn llm_monitoring(State(state): State<GatewayState>) -> Json<Value> {
    Json(json!({ "executions": state.executions.entries().await }))
}

/// GET /api/llm-visualization: static pipeline graph plus one node per logged invocation,
/// each linked from the pipeline's last stage.
async fn llm_visualization(State(state): State<GatewayState>) -> Json<Value> {
    let graph = state.pipeline.graph();
    let terminal = graph.nodes.last().map(|n| n.id);
    let mut nodes: Vec<Value> = graph
        .nodes
        .iter()
        .map(|n| json!({ "id": n.id, "label": n.label, "kind": "stage" }))
        .collect();
    let mut edges: Vec<Value> = graph
        .edges
        .iter()
        .map(|e| json!({ "from": e.from, "to": e.to }))
        .collect();
    for e in state.executions.entries().await {
        if let Some(terminal) = terminal {
            edges.push(json!({ "from": terminal, "to": e.id }));
        }
        nodes.push(json!({
            "id": e.id,
            "label": format!("{} ({} ms)", e.conversation_id, e.latency_ms),
            "kind": "invocation",
            "conversationId": e.conversation_id,
            "latencyMs": e.latency_ms,
            "timestamp": e.timestamp,
        }));
    }
    Json(json!({
        "pipeline": state.pipeline.name(),
        "nodes": nodes,
        "edges": edges,
    }))
}

/// POST /api/toggle/auto-respond: `{phoneNumber, enable}`; `enable` must be a JSON boolean.
async fn toggle_auto_respond(State(state): State<GatewayState>, body: Result<Json<Value>, JsonRejection>) -> Response {
    let body = body.map(|Json(v)| v).unwrap_or(Value::Null);
    let phone_number = body
        .get("phoneNumber")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let enable = body.get("enable").and_then(Value::as_bool);
    let (Some(phone_number), Some(enable)) = (phone_number, enable) else {
        return error(
            StatusCode::BAD_REQUEST,
            "phoneNumber and a boolean enable are required.",
        );
    };
    state.auto_respond.set(phone_number, enable).await;
    log::info!("admin: auto-respond for {} set to {}", phone_number, enable);
    Json(json!({ "phoneNumber": phone_number, "autoRespond": enable })).into_response()
}
