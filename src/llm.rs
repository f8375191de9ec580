//! Single-shot chat completion against an OpenAI-compatible endpoint.

use std::time::Duration;

use anyhow::Context;
use axum::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::history::{Conversation, ConversationTurn, Role};

pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Error)]
pub enum CompletionError {
    /// The request never produced a readable response.
    #[error("completion request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// The provider answered with a non-success status.
    #[error("completion API returned {status}: {message}")]
    Upstream { status: StatusCode, message: String },
    #[error("completion API returned an unusable response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub prior_turns: Conversation,
    pub new_user_text: String,
}

impl CompletionRequest {
    /// `[system, ...prior_turns, user]` in the order the model should read them.
    pub fn messages(&self) -> Vec<ChatMessage<'_>> {
        let mut messages = Vec::with_capacity(self.prior_turns.len() + 2);
        messages.push(ChatMessage {
            role: Role::System,
            content: &self.system_prompt,
        });
        messages.extend(self.prior_turns.iter().map(ChatMessage::from));
        messages.push(ChatMessage {
            role: Role::User,
            content: &self.new_user_text,
        });
        messages
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChatMessage<'a> {
    pub role: Role,
    pub content: &'a str,
}

impl<'a> From<&'a ConversationTurn> for ChatMessage<'a> {
    fn from(turn: &'a ConversationTurn) -> Self {
        ChatMessage {
            role: turn.role,
            content: &turn.content,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError>;
}

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiClient {
    pub fn new(
        api_base: &str,
        api_key: &str,
        model: &str,
        temperature: f32,
        timeout: Option<Duration>,
    ) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .context("Failed to build completion HTTP client")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            model: model.to_string(),
            temperature,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let body = ChatCompletionBody {
            model: &self.model,
            messages: request.messages(),
            temperature: self.temperature,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(CompletionError::Upstream { status, message });
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|e| CompletionError::InvalidResponse(format!("invalid JSON: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                CompletionError::InvalidResponse("response contained no message content".to_string())
            })
    }
}
