//! Rebuilds the prior turns of a Slack thread as model-ready conversation turns.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::slack::{RepliesRequest, SlackApi, SlackMessage};

static MENTION_MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@[A-Z0-9]+>").expect("mention pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Prior turns of a thread, oldest first. Never contains the triggering message.
pub type Conversation = Vec<ConversationTurn>;

/// Remove `<@U123>` mention markup and surrounding whitespace.
pub fn strip_mentions(text: &str) -> String {
    MENTION_MARKUP.replace_all(text, "").trim().to_string()
}

/// Map a Slack message onto a turn. Messages left empty by stripping carry
/// nothing for the model and yield `None`.
pub fn normalize_message(message: &SlackMessage) -> Option<ConversationTurn> {
    let content = strip_mentions(message.text.as_deref()?);
    if content.is_empty() {
        return None;
    }
    Some(if message.bot_id.is_some() {
        ConversationTurn::assistant(content)
    } else {
        ConversationTurn::user(content)
    })
}

/// Fetch the thread rooted at `thread_ts` and return its prior turns.
///
/// Without a thread anchor the exchange is single-turn and nothing is
/// fetched. Pages are followed until Slack stops returning a cursor or
/// `max_pages` is reached, and a message seen on an earlier page is kept
/// only once. Any fetch error degrades to an empty conversation.
pub async fn resolve(
    slack: &dyn SlackApi,
    channel: &str,
    thread_ts: Option<&str>,
    exclude_ts: &str,
    max_pages: usize,
) -> Conversation {
    let Some(thread_ts) = thread_ts else {
        return Conversation::new();
    };

    let mut messages: Vec<SlackMessage> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut cursor = None;
    for page_number in 1..=max_pages.max(1) {
        let request = RepliesRequest::new(channel, thread_ts, cursor.take());
        match slack.conversation_replies(&request).await {
            Ok(page) => {
                // Every page after the first repeats the thread parent.
                messages.extend(
                    page.messages
                        .into_iter()
                        .filter(|m| seen.insert(m.ts.clone())),
                );
                cursor = page.next_cursor;
            }
            Err(e) => {
                tracing::warn!(
                    channel,
                    thread_ts,
                    page = page_number,
                    error = %e,
                    "Failed to fetch thread history, continuing without it"
                );
                return Conversation::new();
            }
        }
        if cursor.is_none() {
            break;
        }
    }

    if cursor.is_some() {
        tracing::info!(
            channel,
            thread_ts,
            max_pages,
            "Thread history truncated at page limit"
        );
    }

    let conversation: Conversation = messages
        .iter()
        .filter(|m| m.ts != exclude_ts)
        .filter_map(normalize_message)
        .collect();

    tracing::debug!(
        channel,
        thread_ts,
        fetched = messages.len(),
        turns = conversation.len(),
        "Resolved thread history"
    );

    conversation
}
