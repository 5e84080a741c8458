//! Outbound call audit log.
//!
//! Every platform call made by the dispatch table becomes one JSON line,
//! emitted through `tracing` and optionally appended to a file.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::types::CallLog;

/// Structured call logger that writes JSON lines to tracing and, if
/// configured, to a file.
pub struct CallLogger {
    log_path: Option<PathBuf>,
    count: RwLock<u64>,
}

impl CallLogger {
    /// If `log_path` is `None`, records go to tracing output only.
    pub fn new(log_path: Option<PathBuf>) -> Self {
        Self {
            log_path,
            count: RwLock::new(0),
        }
    }

    pub async fn log(&self, entry: &CallLog) {
        let json = serde_json::to_string(entry).unwrap_or_else(|e| {
            format!(
                r#"{{"error":"serialization failed: {}","ts":"{}"}}"#,
                e,
                Utc::now().to_rfc3339()
            )
        });

        tracing::info!(target: "slack_call", "{}", json);

        if let Some(ref path) = self.log_path {
            if let Err(e) = append_log_line(path, &json).await {
                tracing::warn!("Failed to write call log: {}", e);
            }
        }

        *self.count.write().await += 1;
    }

    pub fn entry(
        method: &str,
        channel: Option<&str>,
        success: bool,
        elapsed: Duration,
        error: Option<String>,
    ) -> CallLog {
        CallLog {
            ts: Utc::now(),
            method: method.to_string(),
            channel: channel.map(str::to_string),
            success,
            duration_ms: Some(elapsed.as_millis() as u64),
            error,
        }
    }

    /// Number of calls logged so far.
    pub async fn call_count(&self) -> u64 {
        *self.count.read().await
    }
}

async fn append_log_line(path: &std::path::Path, line: &str) -> Result<(), std::io::Error> {
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.write_all(b"\n").await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn logger_counts_calls() {
        let logger = CallLogger::new(None);
        assert_eq!(logger.call_count().await, 0);

        let entry = CallLogger::entry(
            "chat.postMessage",
            Some("C123"),
            true,
            Duration::from_millis(42),
            None,
        );
        logger.log(&entry).await;
        assert_eq!(logger.call_count().await, 1);
    }

    #[tokio::test]
    async fn logger_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calls.jsonl");
        let logger = CallLogger::new(Some(path.clone()));

        logger
            .log(&CallLogger::entry(
                "reactions.add",
                Some("C1"),
                false,
                Duration::from_millis(5),
                Some("invalid_name".to_string()),
            ))
            .await;
        logger
            .log(&CallLogger::entry(
                "conversations.create",
                None,
                true,
                Duration::from_millis(7),
                None,
            ))
            .await;

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"method\":\"reactions.add\""));
        assert!(lines[0].contains("\"error\":\"invalid_name\""));
        assert!(lines[1].contains("\"channel\":null"));
    }

    #[test]
    fn entry_fields() {
        let entry = CallLogger::entry("pins.add", Some("C9"), true, Duration::from_secs(1), None);
        assert_eq!(entry.method, "pins.add");
        assert_eq!(entry.channel.as_deref(), Some("C9"));
        assert_eq!(entry.duration_ms, Some(1000));
        assert!(entry.error.is_none());
    }
}
