pub mod send;
pub mod serve;

use std::fs;
use std::path::Path;

use slack_connector::SlackConfig;

/// Read a JSON connector configuration, letting `SLACK_TOKEN` and
/// `SLACK_SIGNING_SECRET` override the file.
pub fn load_config(path: &Path) -> Result<SlackConfig, String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let mut config: SlackConfig = serde_json::from_str(&raw)
        .map_err(|e| format!("invalid configuration in {}: {}", path.display(), e))?;

    if let Ok(token) = std::env::var("SLACK_TOKEN") {
        config.token = token;
    }
    if let Ok(secret) = std::env::var("SLACK_SIGNING_SECRET") {
        config.signing_secret = Some(secret);
    }

    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();
}
