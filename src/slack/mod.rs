pub mod client;
pub mod events;

pub use client::{
    OutgoingMessage, RepliesPage, RepliesRequest, SlackApi, SlackApiError, SlackClient,
    SlackMessage,
};
pub use events::{AssistantThreadStarted, EventEnvelope, InboundEvent, MessageEvent};

#[cfg(test)]
pub use client::MockSlackApi;
