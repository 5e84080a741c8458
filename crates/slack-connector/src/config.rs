use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConnectorError;

/// Configuration for the Slack connector.
#[derive(Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot token (xoxb-...). Required.
    pub token: String,
    /// User token (xoxp-...). Validated when present; calls use the bot token.
    #[serde(default)]
    pub user_token: Option<String>,
    /// Display name used when posting messages.
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
    /// Room used for outgoing events that carry no target.
    #[serde(default = "default_room")]
    pub default_room: String,
    /// Icon short code shown next to posted messages.
    #[serde(default = "default_icon_emoji")]
    pub icon_emoji: String,
    /// Reply in a new thread under the linked message when it is not threaded yet.
    #[serde(default)]
    pub start_thread: bool,
    /// Signing secret for verifying inbound webhook requests.
    #[serde(default)]
    pub signing_secret: Option<String>,
    /// Base URL of the Slack Web API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Upper bound on inbound event creation before the webhook is acknowledged anyway.
    #[serde(default = "default_ack_deadline_ms")]
    pub ack_deadline_ms: u64,
    /// Optional JSONL file receiving one record per outbound call.
    #[serde(default)]
    pub call_log_path: Option<PathBuf>,
}

fn default_bot_name() -> String {
    "relay".to_string()
}

fn default_room() -> String {
    "#general".to_string()
}

fn default_icon_emoji() -> String {
    ":robot_face:".to_string()
}

fn default_api_base_url() -> String {
    "https://slack.com/api".to_string()
}

fn default_ack_deadline_ms() -> u64 {
    2500
}

impl SlackConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConnectorError> {
        if self.token.trim().is_empty() {
            return Err(ConnectorError::Config("token cannot be empty".to_string()));
        }
        if matches!(self.user_token.as_deref(), Some(t) if t.trim().is_empty()) {
            return Err(ConnectorError::Config(
                "user_token cannot be empty when set".to_string(),
            ));
        }
        if self.default_room.trim().is_empty() {
            return Err(ConnectorError::Config(
                "default_room cannot be empty".to_string(),
            ));
        }
        if self.ack_deadline_ms == 0 {
            return Err(ConnectorError::Config(
                "ack_deadline_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn ack_deadline(&self) -> Duration {
        Duration::from_millis(self.ack_deadline_ms)
    }
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            user_token: None,
            bot_name: default_bot_name(),
            default_room: default_room(),
            icon_emoji: default_icon_emoji(),
            start_thread: false,
            signing_secret: None,
            api_base_url: default_api_base_url(),
            ack_deadline_ms: default_ack_deadline_ms(),
            call_log_path: None,
        }
    }
}

impl std::fmt::Debug for SlackConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |s: &Option<String>| s.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("SlackConfig")
            .field("token", &"[REDACTED]")
            .field("user_token", &redact(&self.user_token))
            .field("bot_name", &self.bot_name)
            .field("default_room", &self.default_room)
            .field("icon_emoji", &self.icon_emoji)
            .field("start_thread", &self.start_thread)
            .field("signing_secret", &redact(&self.signing_secret))
            .field("api_base_url", &self.api_base_url)
            .field("ack_deadline_ms", &self.ack_deadline_ms)
            .field("call_log_path", &self.call_log_path)
            .finish()
    }
}
