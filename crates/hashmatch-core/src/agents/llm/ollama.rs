//! Minimal Ollama `/api/chat` client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::OllamaConfig;
use crate::domain::{HashmatchError, Result};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OllamaError {
    #[error("ollama unreachable: {0}")]
    Unreachable(String),

    #[error("ollama returned status {0}")]
    Status(u16),

    #[error("ollama returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("ollama timed out after {0} ms")]
    Timeout(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

/// Completion seam, so adapters can be tested without a server.
#[async_trait]
pub trait ChatClient: Send + Sync {
    fn model(&self) -> &str;

    async fn chat(&self, messages: &[ChatMessage]) -> std::result::Result<String, OllamaError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    config: OllamaConfig,
    http: reqwest::Client,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("hashmatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HashmatchError::InvalidConfig(format!("ollama client: {e}")))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.config.endpoint.trim_end_matches('/'))
    }

    async fn post_chat(&self, messages: &[ChatMessage]) -> std::result::Result<String, OllamaError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages,
            stream: false,
        };
        let response = self
            .http
            .post(self.chat_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| OllamaError::Unreachable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(OllamaError::Status(status.as_u16()));
        }
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| OllamaError::InvalidResponse(e.to_string()))?;
        parsed
            .message
            .map(|m| m.content)
            .ok_or_else(|| OllamaError::InvalidResponse("missing message.content".to_string()))
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn chat(&self, messages: &[ChatMessage]) -> std::result::Result<String, OllamaError> {
        let limit = Duration::from_millis(self.config.timeout_ms);
        match tokio::time::timeout(limit, self.post_chat(messages)).await {
            Ok(result) => result,
            Err(_) => Err(OllamaError::Timeout(self.config.timeout_ms)),
        }
    }
}
