//! Slack connector: Events API webhooks in, Web API calls out.

pub mod api;
pub mod dispatch;
pub mod emoji;
pub mod events;
pub mod ingress;
pub mod signature;

use std::sync::Arc;

use serde_json::Value;

use crate::config::SlackConfig;
use crate::context::ConnectorContext;
use crate::error::ConnectorError;
use crate::logging::CallLogger;
use crate::traits::{EventSink, RouteRegistrar, SlackTransport};
use crate::types::{ApiResponse, BotIdentity, DomainEvent, EventKind, UserProfile};

use api::{OutgoingCall, SlackApiClient, SlackMethod};
use dispatch::{CallBuilder, DispatchTable};
use ingress::WebhookIngress;

/// Route the ingress is registered under.
pub const WEBHOOK_PATH: &str = "/connector/slack";

/// The Slack connector.
///
/// Owns the connector context and the outbound dispatch table. Until
/// [`SlackConnector::connect`] succeeds the connector is inert: it has no
/// identity and no route, though outgoing events can still be sent.
pub struct SlackConnector {
    ctx: Arc<ConnectorContext>,
    dispatch: DispatchTable,
}

impl SlackConnector {
    pub const NAME: &'static str = "slack";

    pub fn new(config: SlackConfig) -> Result<Self, ConnectorError> {
        config.validate()?;
        let client = SlackApiClient::new(&config.api_base_url, &config.token)?;
        Ok(Self::with_transport(config, Arc::new(client)))
    }

    /// Build a connector over any transport.
    pub fn with_transport(config: SlackConfig, transport: Arc<dyn SlackTransport>) -> Self {
        let call_log = Arc::new(CallLogger::new(config.call_log_path.clone()));
        Self {
            ctx: Arc::new(ConnectorContext::new(config, transport, call_log)),
            dispatch: DispatchTable::standard(),
        }
    }

    pub fn context(&self) -> &Arc<ConnectorContext> {
        &self.ctx
    }

    pub fn config(&self) -> &SlackConfig {
        self.ctx.config()
    }

    pub fn webhook_path(&self) -> &'static str {
        WEBHOOK_PATH
    }

    /// Add an outbound handler for a kind the standard table leaves out.
    pub fn register_handler(
        &mut self,
        kind: EventKind,
        builder: CallBuilder,
    ) -> Result<(), ConnectorError> {
        self.dispatch.register(kind, builder)
    }

    /// Verify the token, learn the bot's own ids and register the webhook route.
    ///
    /// Returns whether the connector is now connected. Failures are logged
    /// and leave the connector inert; they never reach the caller.
    pub async fn connect(&self, registrar: &dyn RouteRegistrar, sink: Arc<dyn EventSink>) -> bool {
        if self.is_connected().await {
            tracing::warn!("Slack connector is already connected");
            return true;
        }

        match self.try_connect(registrar, sink).await {
            Ok(identity) => {
                tracing::info!(
                    user_id = %identity.user_id,
                    bot_id = %identity.bot_id,
                    team = identity.team.as_deref().unwrap_or("unknown"),
                    path = WEBHOOK_PATH,
                    "Connected to Slack"
                );
                true
            }
            Err(e) => {
                tracing::error!(
                    "Unable to connect to Slack: {}. The Slack connector will not be available.",
                    e
                );
                false
            }
        }
    }

    async fn try_connect(
        &self,
        registrar: &dyn RouteRegistrar,
        sink: Arc<dyn EventSink>,
    ) -> Result<BotIdentity, ConnectorError> {
        let whoami = OutgoingCall::new(SlackMethod::AuthTest);
        let auth = self.checked(whoami).await?;
        let user_id = str_of(&auth, "user_id")
            .ok_or_else(|| ConnectorError::Auth("auth.test returned no user_id".to_string()))?;

        let lookup = OutgoingCall::new(SlackMethod::UsersInfo).param("user", user_id.as_str());
        let profile = self.checked(lookup).await?;
        let bot_id = profile
            .get("user")
            .and_then(|user| user.pointer("/profile/bot_id"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ConnectorError::Auth(format!("users.info for {} has no bot_id", user_id))
            })?
            .to_string();

        let identity = BotIdentity {
            user_id,
            bot_id,
            user: str_of(&auth, "user"),
            team: str_of(&auth, "team"),
        };

        // Identity first, so the ingress can skip our own messages from the start.
        self.ctx.set_identity(Some(identity.clone())).await;

        let ingress = WebhookIngress::new(self.ctx.clone(), sink);
        if let Err(e) = registrar.register_route(WEBHOOK_PATH, ingress.router(WEBHOOK_PATH)) {
            self.ctx.set_identity(None).await;
            return Err(e);
        }

        Ok(identity)
    }

    async fn checked(&self, call: OutgoingCall) -> Result<ApiResponse, ConnectorError> {
        let resp = self.ctx.client().call(&call).await?;
        if !resp.ok {
            return Err(ConnectorError::Api {
                method: call.method.to_string(),
                error: resp.error_code(),
                response: resp.to_value(),
            });
        }
        Ok(resp)
    }

    /// Forget the handshake identity. The host keeps whatever route it was given.
    pub async fn disconnect(&self) {
        if self.ctx.identity().await.is_some() {
            self.ctx.set_identity(None).await;
            tracing::info!("Slack connector disconnected");
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.ctx.identity().await.is_some()
    }

    pub async fn identity(&self) -> Option<BotIdentity> {
        self.ctx.identity().await
    }

    /// Send one outgoing event and return the platform's raw response.
    pub async fn send(&self, event: &DomainEvent) -> Result<ApiResponse, ConnectorError> {
        self.dispatch.dispatch(&self.ctx, event).await
    }

    pub async fn lookup_username(&self, user_id: &str) -> Result<UserProfile, ConnectorError> {
        self.ctx.resolve_user(user_id).await
    }

    pub async fn replace_usernames(&self, text: &str) -> Result<String, ConnectorError> {
        self.ctx.substitute_names(text).await
    }
}

fn str_of(resp: &ApiResponse, key: &str) -> Option<String> {
    resp.get(key).and_then(Value::as_str).map(str::to_string)
}
