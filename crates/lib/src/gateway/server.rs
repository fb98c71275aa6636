//! Gateway HTTP server: provider webhook, admin API, health.

use crate::auto_respond::AutoRespondStore;
use crate::channels::{OutboundChannel, WebhookEnvelope, WhatsAppChannel};
use crate::config::{self, BackendKind, Config};
use crate::dispatch::{verify_subscription, Dispatcher};
use crate::gateway::admin;
use crate::llm::{LlmBackend, OllamaClient, OpenAiClient};
use crate::monitoring::ExecutionLog;
use crate::pipeline::{build_pipeline, ReplyPipeline};
use crate::responder::Responder;
use crate::session::SessionStore;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Shared state for the gateway: config, in-memory stores, and the services handlers call.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    /// Webhook verify secret (env over config). None: every handshake is refused.
    pub verify_token: Option<String>,
    /// When Some, `/api/*` requires `Authorization: Bearer <token>`.
    pub admin_token: Option<String>,
    pub sessions: Arc<SessionStore>,
    pub auto_respond: Arc<AutoRespondStore>,
    pub executions: Arc<ExecutionLog>,
    pub pipeline: Arc<dyn ReplyPipeline>,
    pub channel: Arc<dyn OutboundChannel>,
    pub dispatcher: Arc<Dispatcher>,
}

impl GatewayState {
    /// Wire stores, pipeline and dispatcher over the given model backend and outbound channel.
    pub fn new(config: Config, backend: Arc<dyn LlmBackend>, channel: Arc<dyn OutboundChannel>) -> Self {
        let sessions = Arc::new(SessionStore::new());
        let auto_respond = Arc::new(AutoRespondStore::new());
        let executions = Arc::new(ExecutionLog::new(config.monitoring.max_executions));
        let pipeline = build_pipeline(&config.agents, backend);
        let responder = Arc::new(Responder::new(
            sessions.clone(),
            executions.clone(),
            pipeline.clone(),
            config.replies.error_message.clone(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            responder,
            auto_respond.clone(),
            channel.clone(),
            config.replies.clone(),
        ));
        Self {
            verify_token: config::resolve_verify_token(&config),
            admin_token: config::resolve_admin_token(&config),
            config: Arc::new(config),
            sessions,
            auto_respond,
            executions,
            pipeline,
            channel,
            dispatcher,
        }
    }
}

/// Model backend selected by `agents.backend`.
pub fn build_backend(config: &Config) -> Arc<dyn LlmBackend> {
    let agents = &config.agents;
    match agents.backend {
        BackendKind::Openai => Arc::new(OpenAiClient::new(
            agents.base_url.clone(),
            config::resolve_llm_api_key(config),
            agents.temperature,
        )),
        BackendKind::Ollama => Arc::new(OllamaClient::new(agents.base_url.clone(), agents.temperature)),
    }
}

/// WhatsApp Cloud API channel from config and env.
pub fn build_channel(config: &Config) -> Arc<dyn OutboundChannel> {
    Arc::new(WhatsAppChannel::new(
        config::resolve_whatsapp_token(config),
        config::resolve_phone_number_id(config),
        config.whatsapp.api_base.clone(),
        config.whatsapp.api_version.clone(),
    ))
}

/// All gateway routes over the given state.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/webhook", get(webhook_verify).post(webhook_event))
        .nest("/api", admin::routes(state.clone()))
        .with_state(state)
}

/// Run the gateway with the real model backend and WhatsApp channel on `gateway.port`
/// (callers apply PORT / `--port` first). Blocks until shutdown (e.g. Ctrl+C).
pub async fn run_gateway(config: Config) -> Result<()> {
    let backend = build_backend(&config);
    let channel = build_channel(&config);
    log::info!(
        "llm backend: {} (model {}, {:?} pipeline)",
        backend.name(),
        config.agents.model,
        config.agents.pipeline
    );
    serve(GatewayState::new(config, backend, channel)).await
}

/// Bind `gateway.bind:gateway.port` and serve until SIGINT/SIGTERM.
pub async fn serve(state: GatewayState) -> Result<()> {
    let bind = state.config.gateway.bind.trim().to_string();
    if state.verify_token.is_none() {
        log::warn!("no webhook verify token configured; subscription handshakes will be refused");
    }
    if state.admin_token.is_none() && !config::is_loopback_bind(&bind) {
        log::warn!(
            "admin API on {} has no token (set gateway.auth.token or RELAY_ADMIN_TOKEN)",
            bind
        );
    }

    let bind_addr = format!("{}:{}", bind, state.config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.config.gateway.port,
        "pipeline": state.pipeline.name(),
    }))
}

#[derive(Debug, Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// GET /webhook: subscription handshake; echoes `hub.challenge` or 403.
async fn webhook_verify(State(state): State<GatewayState>, Query(params): Query<VerifyParams>) -> Response {
    match verify_subscription(
        params.mode.as_deref(),
        params.verify_token.as_deref(),
        params.challenge.as_deref(),
        state.verify_token.as_deref(),
    ) {
        Some(challenge) => {
            log::info!("webhook verified");
            (StatusCode::OK, challenge).into_response()
        }
        None => {
            log::warn!("webhook verification refused (mode {:?})", params.mode);
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// POST /webhook: provider event delivery. Every message is handled before responding.
async fn webhook_event(State(state): State<GatewayState>, body: Bytes) -> Response {
    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => {
            log::error!("webhook: malformed envelope: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "Error", "message": format!("invalid webhook payload: {}", e) })),
            )
                .into_response();
        }
    };
    let responses = state.dispatcher.dispatch(&envelope).await;
    (StatusCode::OK, Json(json!({ "status": "OK", "responses": responses }))).into_response()
}
