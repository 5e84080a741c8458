//! Slack Web API client.
//!
//! Every call is a named method with a flat parameter map, sent with bot
//! token auth: form-encoded for POST methods, as a query string for GET.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::ConnectorError;
use crate::traits::SlackTransport;
use crate::types::ApiResponse;

/// Slack Web API methods the connector calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlackMethod {
    AuthTest,
    UsersInfo,
    ChatPostMessage,
    ChatUpdate,
    ReactionsAdd,
    ConversationsCreate,
    ConversationsRename,
    ConversationsJoin,
    ConversationsInvite,
    ConversationsSetTopic,
    PinsAdd,
    PinsRemove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVerb {
    Get,
    Post,
}

impl SlackMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlackMethod::AuthTest => "auth.test",
            SlackMethod::UsersInfo => "users.info",
            SlackMethod::ChatPostMessage => "chat.postMessage",
            SlackMethod::ChatUpdate => "chat.update",
            SlackMethod::ReactionsAdd => "reactions.add",
            SlackMethod::ConversationsCreate => "conversations.create",
            SlackMethod::ConversationsRename => "conversations.rename",
            SlackMethod::ConversationsJoin => "conversations.join",
            SlackMethod::ConversationsInvite => "conversations.invite",
            SlackMethod::ConversationsSetTopic => "conversations.setTopic",
            SlackMethod::PinsAdd => "pins.add",
            SlackMethod::PinsRemove => "pins.remove",
        }
    }

    pub fn verb(&self) -> HttpVerb {
        match self {
            SlackMethod::UsersInfo => HttpVerb::Get,
            _ => HttpVerb::Post,
        }
    }
}

impl std::fmt::Display for SlackMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Description of one platform call: the method, its parameters, and the
/// error codes that are downgraded to a warning instead of failing.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingCall {
    pub method: SlackMethod,
    pub params: BTreeMap<String, String>,
    pub soft_failures: &'static [&'static str],
}

impl OutgoingCall {
    pub fn new(method: SlackMethod) -> Self {
        Self {
            method,
            params: BTreeMap::new(),
            soft_failures: &[],
        }
    }

    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn tolerate(mut self, errors: &'static [&'static str]) -> Self {
        self.soft_failures = errors;
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Whether an unsuccessful response with this error code is tolerated.
    pub fn is_soft_failure(&self, error: Option<&str>) -> bool {
        error.is_some_and(|e| self.soft_failures.contains(&e))
    }
}

/// Slack Web API client.
#[derive(Clone)]
pub struct SlackApiClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl SlackApiClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self, ConnectorError> {
        if token.is_empty() {
            return Err(ConnectorError::Config("token cannot be empty".to_string()));
        }
        if base_url.is_empty() {
            return Err(ConnectorError::Config("api_base_url cannot be empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| ConnectorError::Internal(format!("HTTP client init: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn url(&self, method: SlackMethod) -> String {
        format!("{}/{}", self.base_url, method.as_str())
    }
}

#[async_trait]
impl SlackTransport for SlackApiClient {
    async fn call(&self, call: &OutgoingCall) -> Result<ApiResponse, ConnectorError> {
        let url = self.url(call.method);
        let request = match call.method.verb() {
            HttpVerb::Get => self.client.get(&url).query(&call.params),
            HttpVerb::Post => self.client.post(&url).form(&call.params),
        };

        let resp = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ConnectorError::Connection(format!("{} failed: {}", call.method, e)))?;

        let status = resp.status();
        resp.json::<ApiResponse>().await.map_err(|e| {
            ConnectorError::ParseError(format!("{} parse (HTTP {}): {}", call.method, status, e))
        })
    }
}
