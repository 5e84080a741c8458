//! Minimal in-process host: one merged axum router and an event log.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use axum::Router;
use slack_connector::{ConnectorError, DomainEvent, EventSink, RouteRegistrar};

#[derive(Default)]
pub struct LocalHost {
    router: Mutex<Router>,
    paths: Mutex<HashSet<String>>,
    forwarded: AtomicU64,
}

impl LocalHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every route registered so far.
    pub fn router(&self) -> Router {
        match self.router.lock() {
            Ok(router) => router.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }
}

impl RouteRegistrar for LocalHost {
    fn register_route(&self, path: &str, router: Router) -> Result<(), ConnectorError> {
        let mut paths = self
            .paths
            .lock()
            .map_err(|_| ConnectorError::Internal("route table lock poisoned".to_string()))?;
        if !paths.insert(path.to_string()) {
            return Err(ConnectorError::Internal(format!("route {} is already registered", path)));
        }

        let mut merged = self
            .router
            .lock()
            .map_err(|_| ConnectorError::Internal("route table lock poisoned".to_string()))?;
        *merged = std::mem::take(&mut *merged).merge(router);

        tracing::info!(path, "Registered webhook route");
        Ok(())
    }
}

#[async_trait]
impl EventSink for LocalHost {
    async fn forward_event(&self, event: DomainEvent) -> Result<(), ConnectorError> {
        let n = self.forwarded.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(
            n,
            kind = %event.kind(),
            target = event.target.as_deref().unwrap_or("-"),
            user = event.user.as_deref().unwrap_or("-"),
            event_id = event.event_id.as_deref().unwrap_or("-"),
            "Received event"
        );
        match serde_json::to_string(&event.body) {
            Ok(body) => tracing::debug!(%body, "Event body"),
            Err(e) => tracing::warn!("Could not serialize event body: {}", e),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_paths_are_refused() {
        let host = LocalHost::new();
        let path = "/connector/slack";
        host.register_route(path, Router::new()).unwrap();
        assert!(host.register_route(path, Router::new()).is_err());
    }

    #[tokio::test]
    async fn forwarded_events_are_counted() {
        let host = LocalHost::new();
        for text in ["one", "two"] {
            let event = DomainEvent::message(text);
            host.forward_event(event).await.unwrap();
        }
        assert_eq!(host.forwarded(), 2);
    }
}
