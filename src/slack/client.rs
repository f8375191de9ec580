//! Slack Web API calls made by the relay: reading thread replies and posting messages.

use std::time::Duration;

use anyhow::Context;
use axum::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";

/// Page size requested from `conversations.replies`.
const REPLIES_PAGE_LIMIT: u32 = 200;

#[derive(Debug, Error)]
pub enum SlackApiError {
    #[error("slack request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("slack {method} returned HTTP {status}")]
    Status {
        method: &'static str,
        status: StatusCode,
    },
    #[error("slack {method} failed: {error}")]
    Api { method: &'static str, error: String },
}

/// A message as returned by `conversations.replies`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SlackMessage {
    #[serde(default)]
    pub ts: String,
    pub text: Option<String>,
    pub bot_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepliesRequest {
    pub channel: String,
    pub ts: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    pub limit: u32,
}

impl RepliesRequest {
    pub fn new(channel: &str, ts: &str, cursor: Option<String>) -> Self {
        Self {
            channel: channel.to_string(),
            ts: ts.to_string(),
            cursor,
            limit: REPLIES_PAGE_LIMIT,
        }
    }
}

/// One page of a thread, oldest message first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepliesPage {
    pub messages: Vec<SlackMessage>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    pub channel: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepliesResponse {
    ok: bool,
    #[serde(default)]
    messages: Vec<SlackMessage>,
    error: Option<String>,
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    error: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// Fetch one page of replies for the thread rooted at `request.ts`.
    async fn conversation_replies(
        &self,
        request: &RepliesRequest,
    ) -> Result<RepliesPage, SlackApiError>;

    async fn post_message(&self, message: &OutgoingMessage) -> Result<(), SlackApiError>;
}

#[derive(Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
}

impl SlackClient {
    pub fn new(api_base: &str, bot_token: &str, timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("slack-relay"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build Slack HTTP client")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.trim().to_string(),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }
}

#[async_trait]
impl SlackApi for SlackClient {
    async fn conversation_replies(
        &self,
        request: &RepliesRequest,
    ) -> Result<RepliesPage, SlackApiError> {
        const METHOD: &str = "conversations.replies";

        // Read methods only accept form-encoded arguments.
        let response = self
            .http
            .post(self.url(METHOD))
            .bearer_auth(&self.bot_token)
            .form(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SlackApiError::Status {
                method: METHOD,
                status,
            });
        }

        let body: RepliesResponse = response.json().await?;
        if !body.ok {
            return Err(SlackApiError::Api {
                method: METHOD,
                error: body.error.unwrap_or_else(|| "unknown error".to_string()),
            });
        }

        let next_cursor = body
            .response_metadata
            .and_then(|m| m.next_cursor)
            .filter(|c| !c.trim().is_empty());

        Ok(RepliesPage {
            messages: body.messages,
            next_cursor,
        })
    }

    async fn post_message(&self, message: &OutgoingMessage) -> Result<(), SlackApiError> {
        const METHOD: &str = "chat.postMessage";

        let response = self
            .http
            .post(self.url(METHOD))
            .bearer_auth(&self.bot_token)
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SlackApiError::Status {
                method: METHOD,
                status,
            });
        }

        let body: PostMessageResponse = response.json().await?;
        if !body.ok {
            return Err(SlackApiError::Api {
                method: METHOD,
                error: body.error.unwrap_or_else(|| "unknown error".to_string()),
            });
        }

        Ok(())
    }
}
