use std::sync::Arc;

use tokio::sync::RwLock;

use crate::cache::IdentityCache;
use crate::config::SlackConfig;
use crate::error::ConnectorError;
use crate::logging::CallLogger;
use crate::traits::SlackTransport;
use crate::types::{BotIdentity, UserProfile};

/// Process-wide state of one connector, shared by the event creator, the
/// ingress handler and the dispatch table. Owned by `SlackConnector`.
pub struct ConnectorContext {
    config: SlackConfig,
    client: Arc<dyn SlackTransport>,
    users: IdentityCache,
    identity: RwLock<Option<BotIdentity>>,
    call_log: Arc<CallLogger>,
}

impl ConnectorContext {
    pub fn new(
        config: SlackConfig,
        client: Arc<dyn SlackTransport>,
        call_log: Arc<CallLogger>,
    ) -> Self {
        Self {
            config,
            client,
            users: IdentityCache::new(),
            identity: RwLock::new(None),
            call_log,
        }
    }

    pub fn config(&self) -> &SlackConfig {
        &self.config
    }

    pub fn client(&self) -> &dyn SlackTransport {
        self.client.as_ref()
    }

    pub fn users(&self) -> &IdentityCache {
        &self.users
    }

    pub fn call_log(&self) -> &CallLogger {
        &self.call_log
    }

    /// Identity learned by the startup handshake, `None` until connected.
    pub async fn identity(&self) -> Option<BotIdentity> {
        self.identity.read().await.clone()
    }

    pub(crate) async fn set_identity(&self, identity: Option<BotIdentity>) {
        *self.identity.write().await = identity;
    }

    /// The connector's own bot id, once connected.
    pub async fn bot_id(&self) -> Option<String> {
        let identity = self.identity.read().await;
        identity.as_ref().map(|i| i.bot_id.clone())
    }

    pub async fn resolve_user(&self, user_id: &str) -> Result<UserProfile, ConnectorError> {
        self.users.resolve(self.client(), user_id).await
    }

    pub async fn substitute_names(&self, text: &str) -> Result<String, ConnectorError> {
        self.users.substitute_names(self.client(), text).await
    }
}
