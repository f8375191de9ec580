use std::fmt;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};

use crate::llm::{DEFAULT_MODEL, DEFAULT_OPENAI_API_BASE, DEFAULT_TEMPERATURE};
use crate::slack::client::DEFAULT_SLACK_API_BASE;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_HISTORY_MAX_PAGES: usize = 5;
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Replace this with your actual GPT's instructions.";
pub const DEFAULT_ASSISTANT_GREETING: &str = "Hi! How can I help you today?";

#[derive(Clone)]
pub struct RelayConfig {
    pub bind_address: String,
    pub slack_signing_secret: String,
    pub slack_bot_token: String,
    pub slack_api_base: String,
    pub openai_api_key: String,
    pub openai_api_base: String,
    pub model: String,
    pub temperature: f32,
    pub system_prompt: String,
    pub history_max_pages: usize,
    /// Answer top-level DMs inside a thread rooted at the DM itself.
    pub dm_threaded_replies: bool,
    /// Posted when an assistant panel opens without a message. `None` stays silent.
    pub assistant_greeting: Option<String>,
    pub outbound_timeout: Option<Duration>,
    pub dev_mode: bool,
}

// Keep credentials out of logs.
impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("bind_address", &self.bind_address)
            .field("slack_api_base", &self.slack_api_base)
            .field("openai_api_base", &self.openai_api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("system_prompt_len", &self.system_prompt.len())
            .field("history_max_pages", &self.history_max_pages)
            .field("dm_threaded_replies", &self.dm_threaded_replies)
            .field("assistant_greeting", &self.assistant_greeting)
            .field("outbound_timeout", &self.outbound_timeout)
            .field("dev_mode", &self.dev_mode)
            .finish_non_exhaustive()
    }
}

impl RelayConfig {
    /// Load from the process environment (after `.env`, if the caller loaded one).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| get(key).ok_or_else(|| anyhow!("{} must be set", key));

        let port: u16 = parse_var(&get, "PORT")?.unwrap_or(DEFAULT_PORT);
        let bind_address =
            get("RELAY_BIND_ADDRESS").unwrap_or_else(|| format!("0.0.0.0:{}", port));

        let temperature: f32 =
            parse_var(&get, "OPENAI_TEMPERATURE")?.unwrap_or(DEFAULT_TEMPERATURE);
        if !(0.0..=2.0).contains(&temperature) {
            bail!(
                "OPENAI_TEMPERATURE must be between 0.0 and 2.0, got {}",
                temperature
            );
        }

        let system_prompt = match get("SYSTEM_PROMPT_FILE") {
            Some(path) => std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read SYSTEM_PROMPT_FILE {:?}", path))?
                .trim()
                .to_string(),
            None => get("SYSTEM_PROMPT").unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        };

        let history_max_pages: usize = parse_var(&get, "HISTORY_MAX_PAGES")?
            .unwrap_or(DEFAULT_HISTORY_MAX_PAGES)
            .max(1);

        // An explicitly empty greeting disables it, so read it without the empty filter.
        let assistant_greeting = match lookup("ASSISTANT_GREETING") {
            Some(greeting) if greeting.trim().is_empty() => None,
            Some(greeting) => Some(greeting),
            None => Some(DEFAULT_ASSISTANT_GREETING.to_string()),
        };

        let outbound_timeout =
            parse_var::<u64, _>(&get, "OUTBOUND_TIMEOUT_SECS")?.map(Duration::from_secs);

        Ok(Self {
            bind_address,
            slack_signing_secret: required("SLACK_SIGNING_SECRET")?,
            slack_bot_token: required("SLACK_BOT_TOKEN")?,
            slack_api_base: get("SLACK_API_BASE")
                .unwrap_or_else(|| DEFAULT_SLACK_API_BASE.to_string()),
            openai_api_key: required("OPENAI_API_KEY")?,
            openai_api_base: get("OPENAI_API_BASE")
                .unwrap_or_else(|| DEFAULT_OPENAI_API_BASE.to_string()),
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature,
            system_prompt,
            history_max_pages,
            dm_threaded_replies: parse_flag(&get, "DM_THREADED_REPLIES")?.unwrap_or(true),
            assistant_greeting,
            outbound_timeout,
            dev_mode: parse_flag(&get, "RELAY_DEV_MODE")?.unwrap_or(false),
        })
    }
}

fn parse_var<T, G>(get: &G, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{} has an invalid value {:?}", key, raw))
        })
        .transpose()
}

fn parse_flag<G>(get: &G, key: &str) -> Result<Option<bool>>
where
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(anyhow!("{} must be true or false, got {:?}", key, raw)),
        })
        .transpose()
}
