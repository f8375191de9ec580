use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::relay;
use crate::signature::{verify_request, VerificationContext};
use crate::slack::{EventEnvelope, InboundEvent};
use crate::AppState;

const RETRY_NUM_HEADER: &str = "x-slack-retry-num";
const RETRY_REASON_HEADER: &str = "x-slack-retry-reason";

/// Handle Slack Events API callbacks.
///
/// The raw body is verified before it is parsed. Verified events are acked
/// with an empty 200 straight away and processed on a spawned task, so
/// Slack's three second deadline never depends on the model.
pub async fn handle_events(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let now = chrono::Utc::now().timestamp();
    let context = VerificationContext::from_headers(&headers, &body);
    if let Err(reason) = verify_request(&context, &state.config.slack_signing_secret, now) {
        tracing::warn!(%reason, "Rejected Slack request");
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }

    let envelope: EventEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!("Failed to parse Slack event envelope: {}", e);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    if envelope.is_url_verification() {
        tracing::info!("Answering Slack URL verification challenge");
        let challenge = envelope.challenge.unwrap_or_default();
        return Json(serde_json::json!({ "challenge": challenge })).into_response();
    }

    if let Some(retry_num) = headers.get(RETRY_NUM_HEADER).and_then(|v| v.to_str().ok()) {
        let retry_reason = headers
            .get(RETRY_REASON_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown");
        tracing::info!(
            event_id = ?envelope.event_id,
            retry_num,
            retry_reason,
            "Slack redelivered event"
        );
    }

    let Some(dispatch) = classify_envelope(&envelope) else {
        return StatusCode::OK.into_response();
    };

    let span = tracing::info_span!(
        "relay",
        relay_id = %Uuid::new_v4(),
        event_id = envelope.event_id.as_deref().unwrap_or(""),
        team_id = envelope.team_id.as_deref().unwrap_or(""),
        kind = dispatch.kind(),
    );

    let state_clone = state.clone();
    tokio::spawn(
        async move {
            relay::process(&state_clone, dispatch).await;
        }
        .instrument(span),
    );

    StatusCode::OK.into_response()
}

fn classify_envelope(envelope: &EventEnvelope) -> Option<relay::Dispatch> {
    let Some(raw) = envelope.event.clone() else {
        tracing::debug!(kind = %envelope.kind, "Envelope carries no event");
        return None;
    };

    let event = match InboundEvent::from_value(raw) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!("Ignoring undecodable Slack event: {}", e);
            return None;
        }
    };

    let dispatch = relay::classify(event);
    if dispatch.is_none() {
        tracing::debug!(event_id = ?envelope.event_id, "Ignoring unsupported Slack event");
    }
    dispatch
}
