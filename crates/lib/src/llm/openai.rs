//! OpenAI-compatible chat-completions client (OpenAI, LM Studio, vLLM, ...).
//!
//! Uses `POST {base}/chat/completions` with bearer auth. Non-streaming only.

use crate::llm::{ChatMessage, ChatResponse, LlmBackend, LlmError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for an OpenAI-compatible API.
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: Option<String>,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(base_url: Option<String>, api_key: Option<String>, temperature: f32) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            api_key,
            temperature,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl LlmBackend for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    /// POST /chat/completions: non-streaming chat.
    async fn chat(&self, model: &str, messages: Vec<ChatMessage>) -> Result<ChatResponse, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;
        let url = format!("{}/chat/completions", self.base_url);
        let body = OpenAiChatRequest {
            model: model.to_string(),
            messages,
            temperature: self.temperature,
            stream: false,
        };
        let res = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("{} {}", status, body)));
        }
        let data: OpenAiChatResponse = res.json().await?;
        Ok(openai_response_to_chat_response(data))
    }
}

// --- wire types ---

#[derive(Debug, Serialize)]
struct OpenAiChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Option<Vec<OpenAiChoice>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: Option<OpenAiResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

fn openai_response_to_chat_response(data: OpenAiChatResponse) -> ChatResponse {
    let content = data
        .choices
        .and_then(|c| c.into_iter().next())
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .unwrap_or_default();
    ChatResponse { content }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_choice_content_is_used() {
        let data: OpenAiChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"Hi!"}},{"message":{"content":"ignored"}}]}"#,
        )
        .unwrap();
        assert_eq!(openai_response_to_chat_response(data).content, "Hi!");
    }

    #[test]
    fn missing_choices_yield_empty_content() {
        let data: OpenAiChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(openai_response_to_chat_response(data).content, "");
        let data: OpenAiChatResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(openai_response_to_chat_response(data).content, "");
    }

    #[test]
    fn trailing_slash_is_trimmed_from_base_url() {
        let client = OpenAiClient::new(Some("http://127.0.0.1:1234/v1/".to_string()), None, 0.0);
        assert_eq!(client.base_url(), "http://127.0.0.1:1234/v1");
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let client = OpenAiClient::new(None, None, 0.0);
        let err = client
            .chat("gpt-4o-mini", vec![ChatMessage::user("hello")])
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey));
    }
}
