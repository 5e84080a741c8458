//! Slack connector core for chat-bot hosts.
//!
//! Turns Slack webhooks into typed [`DomainEvent`]s for the host and sends
//! outgoing events back through the Slack Web API.
//!
//! - [`SlackConnector`] connects (token check, bot self-identification,
//!   webhook route registration) and sends outgoing events
//! - [`slack::ingress::WebhookIngress`] acknowledges and classifies webhooks
//! - [`slack::events::EventCreator`] maps Slack payloads to events
//! - [`slack::dispatch::DispatchTable`] maps outgoing event kinds to Web API calls
//! - [`cache::IdentityCache`] resolves user ids to profiles
//!
//! The host plugs in through [`RouteRegistrar`] and [`EventSink`].

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod slack;
pub mod traits;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::SlackConfig;
pub use context::ConnectorContext;
pub use error::ConnectorError;
pub use logging::CallLogger;
pub use slack::SlackConnector;
pub use traits::{EventSink, RouteRegistrar, SlackTransport};
pub use types::{
    ApiResponse, BotIdentity, CallLog, DomainEvent, EventBatch, EventBody, EventKind, LinkedEvent,
    UserProfile,
};
