// Common test utilities and helpers
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use httpmock::{Mock, MockServer};

use slack_relay::{config::RelayConfig, signature::compute_signature, AppState};

pub const SIGNING_SECRET: &str = "e2e-signing-secret";

/// Build relay state whose Slack and OpenAI clients point at mock servers.
pub fn relay_state(slack: &MockServer, openai: &MockServer, extra: &[(&str, &str)]) -> Arc<AppState> {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("SLACK_SIGNING_SECRET".into(), SIGNING_SECRET.into());
    vars.insert("SLACK_BOT_TOKEN".into(), "xoxb-e2e".into());
    vars.insert("OPENAI_API_KEY".into(), "sk-e2e".into());
    vars.insert("SYSTEM_PROMPT".into(), "You are a test assistant.".into());
    vars.insert("SLACK_API_BASE".into(), format!("{}/api", slack.base_url()));
    vars.insert("OPENAI_API_BASE".into(), format!("{}/v1", openai.base_url()));
    vars.insert("OUTBOUND_TIMEOUT_SECS".into(), "5".into());
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }

    let config = RelayConfig::from_lookup(|key| vars.get(key).cloned())
        .expect("e2e config should load");
    Arc::new(AppState::from_config(config).expect("clients should build"))
}

/// A correctly signed Events API request carrying `body`.
pub fn signed_event(body: &serde_json::Value) -> Request<Body> {
    let body = body.to_string();
    let ts = chrono::Utc::now().timestamp().to_string();
    Request::builder()
        .method("POST")
        .uri("/slack/events")
        .header("content-type", "application/json")
        .header("X-Slack-Request-Timestamp", &ts)
        .header(
            "X-Slack-Signature",
            compute_signature(SIGNING_SECRET, &ts, body.as_bytes()),
        )
        .body(Body::from(body))
        .expect("request should build")
}

/// Post-ack work runs on a spawned task; poll until the mock has been hit.
pub async fn wait_for_calls(mock: &Mock<'_>, expected: usize) {
    for _ in 0..100 {
        if mock.calls_async().await >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!(
        "expected {} calls, saw {}",
        expected,
        mock.calls_async().await
    );
}

/// Give spawned tasks a moment so "never called" assertions mean something.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(300)).await;
}
