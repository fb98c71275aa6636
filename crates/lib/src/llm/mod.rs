//! LLM abstraction and HTTP clients.
//!
//! [`LlmBackend`] is the seam the reply pipeline calls through. Two clients implement it:
//! an OpenAI-compatible chat-completions client and an Ollama `/api/chat` client.

mod ollama;
mod openai;

pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("llm api error: {0}")]
    Api(String),
    #[error("llm api key not configured")]
    MissingApiKey,
    #[error("model returned an empty reply")]
    EmptyReply,
}

/// A chat message in backend-neutral form (role: "system" | "user" | "assistant").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// Assistant reply from one chat call.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub content: String,
}

impl ChatResponse {
    /// Reply text, or [`LlmError::EmptyReply`] when the model produced nothing usable.
    pub fn into_text(self) -> Result<String, LlmError> {
        if self.content.trim().is_empty() {
            Err(LlmError::EmptyReply)
        } else {
            Ok(self.content)
        }
    }
}

/// A chat-completion backend. Implementations are cheap to share behind `Arc`.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Short backend name for logs and the visualization endpoint.
    fn name(&self) -> &str;

    /// Non-streaming chat completion.
    async fn chat(&self, model: &str, messages: Vec<ChatMessage>) -> Result<ChatResponse, LlmError>;
}
