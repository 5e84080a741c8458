//! User identifier to profile resolution.
//!
//! Profiles are cached for the life of the process and never refreshed.
//! Concurrent misses on the same id may each call `users.info`; the last
//! write wins and the values are equivalent.

use std::collections::HashMap;
use std::sync::OnceLock;

use dashmap::DashMap;
use regex::{Captures, Regex};

use crate::error::ConnectorError;
use crate::slack::api::{OutgoingCall, SlackMethod};
use crate::traits::SlackTransport;
use crate::types::UserProfile;

/// `<@U123>` or `<@U123|display hint>`.
fn mention_pattern() -> &'static Regex {
    static MENTION: OnceLock<Regex> = OnceLock::new();
    MENTION.get_or_init(|| {
        Regex::new(r"<@([A-Z0-9]+)(?:\|[^>]*)?>").expect("mention regex is valid")
    })
}

/// Append-only cache of resolved user profiles.
#[derive(Default)]
pub struct IdentityCache {
    users: DashMap<String, UserProfile>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: &str) -> Option<UserProfile> {
        self.users.get(user_id).map(|entry| entry.value().clone())
    }

    pub fn insert(&self, profile: UserProfile) {
        self.users.insert(profile.id.clone(), profile);
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Resolve a user id, calling `users.info` only on a cache miss.
    pub async fn resolve(
        &self,
        client: &dyn SlackTransport,
        user_id: &str,
    ) -> Result<UserProfile, ConnectorError> {
        if let Some(profile) = self.get(user_id) {
            return Ok(profile);
        }

        let call = OutgoingCall::new(SlackMethod::UsersInfo).param("user", user_id);
        let resp = client.call(&call).await?;
        if !resp.ok {
            return Err(ConnectorError::Api {
                method: call.method.to_string(),
                error: resp.error_code(),
                response: resp.to_value(),
            });
        }

        let raw = resp.get("user").cloned().unwrap_or(serde_json::Value::Null);
        let profile: UserProfile = serde_json::from_value(raw)
            .map_err(|e| ConnectorError::ParseError(format!("profile of {}: {}", user_id, e)))?;

        // The platform may key the record differently; store under the id we were asked for.
        self.users.insert(user_id.to_string(), profile.clone());
        tracing::debug!(user_id, name = %profile.name, "Cached Slack user");
        Ok(profile)
    }

    /// Replace every `<@ID>` / `<@ID|hint>` mention with the user's name.
    ///
    /// All mentioned ids are resolved before any replacement, so a failed
    /// lookup returns the error and no partially substituted text.
    pub async fn substitute_names(
        &self,
        client: &dyn SlackTransport,
        text: &str,
    ) -> Result<String, ConnectorError> {
        let pattern = mention_pattern();

        let user_ids: Vec<String> = pattern
            .captures_iter(text)
            .map(|caps| caps[1].to_string())
            .collect();

        let mut names: HashMap<String, String> = HashMap::new();
        for user_id in user_ids {
            if !names.contains_key(&user_id) {
                let profile = self.resolve(client, &user_id).await?;
                names.insert(user_id, profile.name);
            }
        }

        if names.is_empty() {
            return Ok(text.to_string());
        }

        let replaced = pattern.replace_all(text, |caps: &Captures| {
            names
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        });
        Ok(replaced.into_owned())
    }
}
