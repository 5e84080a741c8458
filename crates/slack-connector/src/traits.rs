use async_trait::async_trait;
use axum::Router;

use crate::error::ConnectorError;
use crate::slack::api::OutgoingCall;
use crate::types::{ApiResponse, DomainEvent};

/// Thin client for the Slack Web API.
///
/// Implementations perform the HTTP exchange and return the platform's
/// response as-is, including `ok: false` answers. Deciding whether a
/// response counts as a failure is left to the caller.
#[async_trait]
pub trait SlackTransport: Send + Sync {
    async fn call(&self, call: &OutgoingCall) -> Result<ApiResponse, ConnectorError>;
}

/// The host's event intake. Accepts exactly one event per call.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn forward_event(&self, event: DomainEvent) -> Result<(), ConnectorError>;
}

/// The host's HTTP routing table.
pub trait RouteRegistrar: Send + Sync {
    fn register_route(&self, path: &str, router: Router) -> Result<(), ConnectorError>;
}
