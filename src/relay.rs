//! Post-ack event handling: classify a verified Slack event and run the
//! matching history → completion → reply chain.

use crate::history::{self, strip_mentions};
use crate::llm::CompletionRequest;
use crate::reply;
use crate::slack::{AssistantThreadStarted, InboundEvent, MessageEvent, OutgoingMessage};
use crate::AppState;

/// Reply sent in place of a completion when the model call fails.
pub const APOLOGY_TEXT: &str = "Sorry, I encountered an error processing your request.";

#[derive(Debug, Clone)]
pub enum Dispatch {
    Mention(MessageEvent),
    DirectMessage(MessageEvent),
    AssistantThreadStarted(AssistantThreadStarted),
}

impl Dispatch {
    pub fn kind(&self) -> &'static str {
        match self {
            Dispatch::Mention(_) => "app_mention",
            Dispatch::DirectMessage(_) => "direct_message",
            Dispatch::AssistantThreadStarted(_) => "assistant_thread_started",
        }
    }
}

/// Decide which handler chain an event needs. `None` means it is ignored.
pub fn classify(event: InboundEvent) -> Option<Dispatch> {
    match event {
        InboundEvent::AssistantThreadStarted(started) => {
            Some(Dispatch::AssistantThreadStarted(started))
        }
        InboundEvent::AppMention(mention) => Some(Dispatch::Mention(mention)),
        InboundEvent::Message(message) if message.is_direct_message() && !message.is_from_bot() => {
            Some(Dispatch::DirectMessage(message))
        }
        InboundEvent::Message(_) | InboundEvent::Unsupported => None,
    }
}

/// One conversational exchange, fully resolved from the triggering event.
#[derive(Debug)]
struct Turn<'a> {
    channel: &'a str,
    user: Option<&'a str>,
    subtype: Option<&'a str>,
    user_text: String,
    history_anchor: Option<&'a str>,
    exclude_ts: &'a str,
    reply_anchor: Option<String>,
}

pub async fn process(state: &AppState, dispatch: Dispatch) {
    match dispatch {
        Dispatch::Mention(event) => handle_mention(state, &event).await,
        Dispatch::DirectMessage(event) => handle_direct_message(state, &event).await,
        Dispatch::AssistantThreadStarted(event) => handle_assistant_thread_started(state, &event).await,
    }
}

async fn handle_mention(state: &AppState, event: &MessageEvent) {
    let turn = Turn {
        channel: &event.channel,
        user: event.user.as_deref(),
        subtype: event.subtype.as_deref(),
        user_text: strip_mentions(&event.text),
        history_anchor: event.thread_ts.as_deref(),
        exclude_ts: &event.ts,
        reply_anchor: Some(event.ts.clone()),
    };
    run_turn(state, turn).await;
}

async fn handle_direct_message(state: &AppState, event: &MessageEvent) {
    let reply_anchor = match (&event.thread_ts, state.config.dm_threaded_replies) {
        (Some(thread_ts), _) => Some(thread_ts.clone()),
        (None, true) => Some(event.ts.clone()),
        (None, false) => None,
    };
    let turn = Turn {
        channel: &event.channel,
        user: event.user.as_deref(),
        subtype: event.subtype.as_deref(),
        user_text: strip_mentions(&event.text),
        history_anchor: event.thread_ts.as_deref(),
        exclude_ts: &event.ts,
        reply_anchor,
    };
    run_turn(state, turn).await;
}

async fn handle_assistant_thread_started(state: &AppState, event: &AssistantThreadStarted) {
    let thread = &event.assistant_thread;
    let user_text = event.user_message().map(strip_mentions).unwrap_or_default();

    if !user_text.is_empty() {
        // The panel thread was just created, so there is no history to fetch.
        let turn = Turn {
            channel: &thread.channel_id,
            user: thread.user_id.as_deref(),
            subtype: None,
            user_text,
            history_anchor: None,
            exclude_ts: &thread.thread_ts,
            reply_anchor: Some(thread.thread_ts.clone()),
        };
        run_turn(state, turn).await;
        return;
    }

    match &state.config.assistant_greeting {
        Some(greeting) => {
            reply::dispatch(
                state.slack.as_ref(),
                OutgoingMessage {
                    channel: thread.channel_id.clone(),
                    text: greeting.clone(),
                    thread_ts: Some(thread.thread_ts.clone()),
                },
            )
            .await;
        }
        None => {
            tracing::debug!(
                channel = %thread.channel_id,
                user = ?thread.user_id,
                "Assistant thread started without a message and no greeting configured"
            );
        }
    }
}

async fn run_turn(state: &AppState, turn: Turn<'_>) {
    if turn.user_text.is_empty() {
        tracing::info!(
            channel = turn.channel,
            ts = turn.exclude_ts,
            user = ?turn.user,
            subtype = ?turn.subtype,
            "Message is empty after removing mentions, not calling the model"
        );
        return;
    }

    let prior_turns = history::resolve(
        state.slack.as_ref(),
        turn.channel,
        turn.history_anchor,
        turn.exclude_ts,
        state.config.history_max_pages,
    )
    .await;

    tracing::info!(
        channel = turn.channel,
        user = ?turn.user,
        history_turns = prior_turns.len(),
        "Calling completion API"
    );

    let request = CompletionRequest {
        system_prompt: state.config.system_prompt.clone(),
        prior_turns,
        new_user_text: turn.user_text,
    };

    let text = match state.llm.complete(&request).await {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(channel = turn.channel, error = %e, "Completion failed, sending apology");
            APOLOGY_TEXT.to_string()
        }
    };

    reply::dispatch(
        state.slack.as_ref(),
        OutgoingMessage {
            channel: turn.channel.to_string(),
            text,
            thread_ts: turn.reply_anchor,
        },
    )
    .await;
}
