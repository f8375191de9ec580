// Library entry point for the binary and integration tests
pub mod api;
pub mod config;
pub mod history;
pub mod llm;
pub mod relay;
pub mod reply;
pub mod signature;
pub mod slack;

use std::sync::Arc;

use config::RelayConfig;
use llm::{CompletionClient, OpenAiClient};
use slack::{SlackApi, SlackClient};

pub struct AppState {
    pub config: RelayConfig,
    pub slack: Arc<dyn SlackApi>,
    pub llm: Arc<dyn CompletionClient>,
}

impl AppState {
    /// Build the live Slack and OpenAI clients from configuration.
    pub fn from_config(config: RelayConfig) -> anyhow::Result<Self> {
        let slack = SlackClient::new(
            &config.slack_api_base,
            &config.slack_bot_token,
            config.outbound_timeout,
        )?;
        let llm = OpenAiClient::new(
            &config.openai_api_base,
            &config.openai_api_key,
            &config.model,
            config.temperature,
            config.outbound_timeout,
        )?;

        Ok(Self {
            config,
            slack: Arc::new(slack),
            llm: Arc::new(llm),
        })
    }
}
