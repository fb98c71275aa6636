//! Ollama API client (http://127.0.0.1:11434 by default).

use crate::llm::{ChatMessage, ChatResponse, LlmBackend, LlmError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";

/// Client for Ollama HTTP API.
#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(base_url: Option<String>, temperature: f32) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            temperature,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmBackend for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    /// POST /api/chat: non-streaming chat completion.
    async fn chat(&self, model: &str, messages: Vec<ChatMessage>) -> Result<ChatResponse, LlmError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model: model.to_string(),
            messages,
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
            },
        };
        let res = self.client.post(&url).json(&body).send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("{} {}", status, body)));
        }
        let data: OllamaChatResponse = res.json().await?;
        Ok(ChatResponse {
            content: data.message.map(|m| m.content).unwrap_or_default(),
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: Option<ChatMessage>,
}
