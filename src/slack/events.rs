//! Inbound Slack Events API payloads.

use serde::Deserialize;

pub const URL_VERIFICATION: &str = "url_verification";

/// Outer Events API body. The inner `event` stays raw so that an event we
/// cannot decode is ignored rather than rejected.
#[derive(Debug, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub challenge: Option<String>,
    pub event: Option<serde_json::Value>,
    pub event_id: Option<String>,
    pub team_id: Option<String>,
}

impl EventEnvelope {
    pub fn is_url_verification(&self) -> bool {
        self.kind == URL_VERIFICATION
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    AppMention(MessageEvent),
    Message(MessageEvent),
    AssistantThreadStarted(AssistantThreadStarted),
    #[serde(other)]
    Unsupported,
}

impl InboundEvent {
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// Fields shared by `app_mention` and `message` events.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageEvent {
    pub channel: String,
    pub ts: String,
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub text: String,
    pub user: Option<String>,
    pub bot_id: Option<String>,
    pub channel_type: Option<String>,
    pub subtype: Option<String>,
}

impl MessageEvent {
    pub fn is_direct_message(&self) -> bool {
        self.channel_type.as_deref() == Some("im")
    }

    pub fn is_from_bot(&self) -> bool {
        self.bot_id.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantThreadStarted {
    pub assistant_thread: AssistantThread,
    pub user_message: Option<String>,
}

impl AssistantThreadStarted {
    /// The message the user opened the panel with, if Slack embedded one.
    pub fn user_message(&self) -> Option<&str> {
        self.user_message
            .as_deref()
            .or(self.assistant_thread.user_message.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantThread {
    pub channel_id: String,
    pub thread_ts: String,
    pub user_id: Option<String>,
    pub user_message: Option<String>,
}
