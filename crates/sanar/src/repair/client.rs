//! OpenAI-compatible HTTP Repair Oracle.
//!
//! Works against any server exposing `/v1/chat/completions` (OpenAI,
//! ollama, llama.cpp, vLLM).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::oracle::{ModelConfig, RepairOracle};
use crate::result::{SanarError, SanarResult};

/// Chat message role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt
    System,
    /// User message
    User,
    /// Assistant response
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// The role of the message author.
    pub role: Role,
    /// The content of the message.
    pub content: String,
}

impl ChatMessage {
    /// Message with `role` and `content`
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Parameters for a chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model identifier (may be ignored by some backends).
    pub model: String,
    /// The messages for the chat completion.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature (0.0 = deterministic).
    pub temperature: f64,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Repairs are never streamed.
    pub stream: bool,
}

impl ChatRequest {
    /// Request for one repair under `model`
    #[must_use]
    pub fn repair(system: &str, user: &str, model: &ModelConfig) -> Self {
        Self {
            model: model.model.clone(),
            messages: vec![
                ChatMessage::new(Role::System, system),
                ChatMessage::new(Role::User, user),
            ],
            temperature: model.temperature,
            max_tokens: model.max_tokens,
            stream: false,
        }
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Usage {
    /// Tokens in the prompt.
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Tokens generated.
    #[serde(default)]
    pub completion_tokens: u32,
}

/// A single completion choice.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatResponseChoice {
    /// The generated message.
    pub message: ChatMessage,
    /// Why generation stopped.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Response from a chat completion endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatResponse {
    /// Generated choices.
    pub choices: Vec<ChatResponseChoice>,
    /// Token usage statistics.
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatResponse {
    /// Content of the first choice
    #[must_use]
    pub fn first_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// HTTP Repair Oracle.
#[derive(Debug, Clone)]
pub struct LlmOracle {
    base_url: String,
    client: reqwest::Client,
    api_key: Option<String>,
}

impl LlmOracle {
    /// Oracle at `base_url` (e.g., `http://localhost:11434`)
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();
        Self::with_client(base_url, client)
    }

    /// Oracle with a custom reqwest client (for custom timeouts, etc.).
    #[must_use]
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            api_key: None,
        }
    }

    /// Send `Authorization: Bearer <key>` with every request
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Endpoint the oracle posts to
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    /// Send a chat completion request.
    pub async fn chat_completion(&self, request: &ChatRequest) -> SanarResult<ChatResponse> {
        let start = Instant::now();
        let mut builder = self.client.post(self.endpoint()).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let resp = builder
            .send()
            .await
            .map_err(|e| SanarError::oracle(format!("HTTP error: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SanarError::oracle(format!(
                "API error {}: {body}",
                status.as_u16()
            )));
        }

        let response: ChatResponse = resp
            .json()
            .await
            .map_err(|e| SanarError::oracle(format!("invalid response: {e}")))?;
        debug!(
            model = %request.model,
            latency_ms = start.elapsed().as_millis() as u64,
            completion_tokens = response.usage.as_ref().map(|u| u.completion_tokens),
            "Repair completion received"
        );
        Ok(response)
    }
}

#[async_trait]
impl RepairOracle for LlmOracle {
    async fn complete(&self, system: &str, user: &str, model: &ModelConfig) -> SanarResult<String> {
        let response = self
            .chat_completion(&ChatRequest::repair(system, user, model))
            .await?;
        response
            .first_content()
            .map(str::to_string)
            .ok_or_else(|| SanarError::oracle("response has no choices"))
    }
}
