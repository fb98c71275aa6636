//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.relay/config.json`) and environment.
//! Secrets (provider token, verify token, model key) are usually supplied through the
//! environment or a `.env` file; the `resolve_*` helpers apply env-over-file precedence.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP listener and admin auth.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// WhatsApp Cloud API credentials and endpoint.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// Model backend, pipeline shape and prompt text.
    #[serde(default)]
    pub agents: AgentsConfig,

    /// Canned replies used outside the model path.
    #[serde(default)]
    pub replies: RepliesConfig,

    /// Execution log retention.
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// Gateway bind, port, and admin auth settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 3000). Overridden by PORT env.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0"; the provider must be able to reach the webhook).
    #[serde(default = "default_gateway_bind")]
    pub bind: String,

    #[serde(default)]
    pub auth: GatewayAuthConfig,
}

/// Admin surface auth: a static bearer token. When unset, `/api/*` is open.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayAuthConfig {
    /// Shared secret for the admin endpoints. Overridden by RELAY_ADMIN_TOKEN env.
    pub token: Option<String>,
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
            auth: GatewayAuthConfig::default(),
        }
    }
}

/// WhatsApp Cloud API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppConfig {
    /// Permanent or temporary access token. Overridden by WHATSAPP_ACCESS_TOKEN env.
    pub access_token: Option<String>,
    /// Business phone number id used in the send URL. Overridden by WHATSAPP_PHONE_NUMBER_ID (or WHATSAPP_APP_ID) env.
    pub phone_number_id: Option<String>,
    /// Secret echoed back by the provider during webhook verification. Overridden by WHATSAPP_VERIFY_TOKEN env.
    pub verify_token: Option<String>,
    /// Graph API origin (default "https://graph.facebook.com").
    #[serde(default = "default_whatsapp_api_base")]
    pub api_base: String,
    /// Graph API version segment (default "v17.0").
    #[serde(default = "default_whatsapp_api_version")]
    pub api_version: String,
}

fn default_whatsapp_api_base() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_whatsapp_api_version() -> String {
    "v17.0".to_string()
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            phone_number_id: None,
            verify_token: None,
            api_base: default_whatsapp_api_base(),
            api_version: default_whatsapp_api_version(),
        }
    }
}

/// Which model server speaks to the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// OpenAI-compatible `/chat/completions` (OpenAI, LM Studio, vLLM, ...).
    #[default]
    Openai,
    /// Ollama `/api/chat`.
    Ollama,
}

/// Shape of the reply pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PipelineMode {
    /// One chat call: system prompt + history + input.
    SingleStage,
    /// A reasoning call followed by a formatting call that condenses it and appends follow-up actions.
    #[default]
    TwoStage,
}

/// Model settings and prompt text. All prompt text is opaque configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentsConfig {
    #[serde(default)]
    pub backend: BackendKind,
    /// Model name passed as-is to the backend (default "gpt-4o-mini").
    #[serde(default = "default_model")]
    pub model: String,
    /// Base URL of the backend. Defaults per backend when unset.
    pub base_url: Option<String>,
    /// API key for the OpenAI-compatible backend. Overridden by OPENAI_API_KEY env.
    pub api_key: Option<String>,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default)]
    pub pipeline: PipelineMode,
    /// System instruction (persona and behavior) sent with every request.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Template for the reasoning stage; `{input}` is replaced by the user input.
    #[serde(default = "default_reasoning_template")]
    pub reasoning_template: String,
    /// Template for the formatting stage; `{input}` is replaced by the reasoning output.
    #[serde(default = "default_formatting_template")]
    pub formatting_template: String,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful assistant replying to WhatsApp messages. Keep answers short and friendly. \
     At the end, include exactly 3 follow-up actions, each on a new line starting with \"- \"."
        .to_string()
}

fn default_reasoning_template() -> String {
    "Think step by step about the user's message below and write out your reasoning as a \
     structured series of sub-questions and answers.\n\nUSER\n{input}\nEND_USER"
        .to_string()
}

fn default_formatting_template() -> String {
    "Format the following response in markdown and condense it to be sent as a WhatsApp message. \
     At the end, include exactly 3 follow-up actions, each on a new line starting with \"- \": {input}"
        .to_string()
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            model: default_model(),
            base_url: None,
            api_key: None,
            temperature: 0.0,
            pipeline: PipelineMode::default(),
            system_prompt: default_system_prompt(),
            reasoning_template: default_reasoning_template(),
            formatting_template: default_formatting_template(),
        }
    }
}

/// Fixed user-facing texts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepliesConfig {
    /// Sent instead of a model reply when auto-respond is enabled for the sender.
    #[serde(default = "default_auto_respond_message")]
    pub auto_respond_message: String,
    /// Sent back for message types the relay does not handle (images, audio, ...).
    #[serde(default = "default_unsupported_message")]
    pub unsupported_message: String,
    /// Sent when the model pipeline fails.
    #[serde(default = "default_error_message")]
    pub error_message: String,
}

fn default_auto_respond_message() -> String {
    "Thanks for your message! Check out our latest offers while we get back to you.".to_string()
}

fn default_unsupported_message() -> String {
    "Sorry, I can only read text messages for now.".to_string()
}

fn default_error_message() -> String {
    "Sorry, I encountered an error while processing your message.".to_string()
}

impl Default for RepliesConfig {
    fn default() -> Self {
        Self {
            auto_respond_message: default_auto_respond_message(),
            unsupported_message: default_unsupported_message(),
            error_message: default_error_message(),
        }
    }
}

/// Execution log retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringConfig {
    /// Most recent invocations kept for `/api/llm-monitoring` (default 1000, minimum 1).
    #[serde(default = "default_max_executions")]
    pub max_executions: usize,
}

fn default_max_executions() -> usize {
    1000
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            max_executions: default_max_executions(),
        }
    }
}

/// Trimmed env var, or None when unset or blank.
fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Trimmed config value, or None when unset or blank.
fn config_non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve the listen port: env PORT overrides config when it parses.
pub fn resolve_port(config: &Config) -> u16 {
    match env_non_empty("PORT").map(|p| p.parse::<u16>()) {
        Some(Ok(port)) => port,
        Some(Err(_)) => {
            log::warn!("ignoring invalid PORT env value");
            config.gateway.port
        }
        None => config.gateway.port,
    }
}

/// Resolve the WhatsApp access token: env WHATSAPP_ACCESS_TOKEN overrides config.
pub fn resolve_whatsapp_token(config: &Config) -> Option<String> {
    env_non_empty("WHATSAPP_ACCESS_TOKEN").or_else(|| config_non_empty(&config.whatsapp.access_token))
}

/// Resolve the phone number id: env WHATSAPP_PHONE_NUMBER_ID, then WHATSAPP_APP_ID, then config.
pub fn resolve_phone_number_id(config: &Config) -> Option<String> {
    env_non_empty("WHATSAPP_PHONE_NUMBER_ID")
        .or_else(|| env_non_empty("WHATSAPP_APP_ID"))
        .or_else(|| config_non_empty(&config.whatsapp.phone_number_id))
}

/// Resolve the webhook verify secret: env WHATSAPP_VERIFY_TOKEN overrides config.
pub fn resolve_verify_token(config: &Config) -> Option<String> {
    env_non_empty("WHATSAPP_VERIFY_TOKEN").or_else(|| config_non_empty(&config.whatsapp.verify_token))
}

/// Resolve the model API key: env OPENAI_API_KEY overrides config.
pub fn resolve_llm_api_key(config: &Config) -> Option<String> {
    env_non_empty("OPENAI_API_KEY").or_else(|| config_non_empty(&config.agents.api_key))
}

/// Resolve the admin token: env RELAY_ADMIN_TOKEN overrides config.
pub fn resolve_admin_token(config: &Config) -> Option<String> {
    env_non_empty("RELAY_ADMIN_TOKEN").or_else(|| config_non_empty(&config.gateway.auth.token))
}

/// True if the bind address is loopback (127.0.0.1, ::1, etc.).
pub fn is_loopback_bind(bind: &str) -> bool {
    let b = bind.trim();
    b == "127.0.0.1" || b == "::1" || b == "localhost"
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("RELAY_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".relay").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path (or the default). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        parse_config_file(&path)?
    };
    Ok((config, path))
}

fn parse_config_file(path: &Path) -> Result<Config> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parsing config from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.gateway.port, 3000);
        assert_eq!(config.gateway.bind, "0.0.0.0");
        assert_eq!(config.whatsapp.api_base, "https://graph.facebook.com");
        assert_eq!(config.whatsapp.api_version, "v17.0");
        assert_eq!(config.agents.backend, BackendKind::Openai);
        assert_eq!(config.agents.pipeline, PipelineMode::TwoStage);
        assert_eq!(config.monitoring.max_executions, 1000);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let json = r#"{
            "gateway": { "port": 8080 },
            "agents": { "backend": "ollama", "pipeline": "singleStage", "model": "llama3.2:latest" },
            "replies": { "unsupportedMessage": "text only please" }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.gateway.bind, "0.0.0.0");
        assert_eq!(config.agents.backend, BackendKind::Ollama);
        assert_eq!(config.agents.pipeline, PipelineMode::SingleStage);
        assert_eq!(config.agents.model, "llama3.2:latest");
        assert_eq!(config.replies.unsupported_message, "text only please");
        assert_eq!(
            config.replies.error_message,
            "Sorry, I encountered an error while processing your message."
        );
    }

    #[test]
    fn blank_config_values_resolve_to_none() {
        let mut config = Config::default();
        config.whatsapp.verify_token = Some("   ".to_string());
        assert_eq!(config_non_empty(&config.whatsapp.verify_token), None);
        config.whatsapp.verify_token = Some(" secret ".to_string());
        assert_eq!(
            config_non_empty(&config.whatsapp.verify_token).as_deref(),
            Some("secret")
        );
    }

    #[test]
    fn loopback_detection() {
        assert!(is_loopback_bind("127.0.0.1"));
        assert!(is_loopback_bind(" localhost "));
        assert!(!is_loopback_bind("0.0.0.0"));
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let path = std::env::temp_dir().join(format!("relay-missing-{}.json", uuid::Uuid::new_v4()));
        let (config, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert_eq!(config.gateway.port, 3000);
    }
}
