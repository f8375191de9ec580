use crate::slack::{OutgoingMessage, SlackApi};

/// Post a reply and forget about it. Delivery failures are logged here and
/// never reach the caller.
pub async fn dispatch(slack: &dyn SlackApi, message: OutgoingMessage) {
    match slack.post_message(&message).await {
        Ok(()) => {
            tracing::info!(
                channel = %message.channel,
                thread_ts = ?message.thread_ts,
                "Reply posted to Slack"
            );
        }
        Err(e) => {
            tracing::error!(
                channel = %message.channel,
                thread_ts = ?message.thread_ts,
                error = %e,
                "Failed to post reply to Slack"
            );
        }
    }
}
