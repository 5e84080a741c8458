//! Inbound webhook handling.
//!
//! One request moves through: signature check (when a signing secret is
//! configured), payload decoding, classification, event creation bounded by
//! the acknowledgement deadline, and fire-and-continue forwarding of every
//! created event to the host. The acknowledgement does not depend on what
//! happens after classification.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::context::ConnectorContext;
use crate::error::ConnectorError;
use crate::slack::events::{EventCreator, INTERACTIVE_TYPES};
use crate::slack::signature::{self, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use crate::traits::EventSink;
use crate::types::EventBatch;

/// Body of every non-challenge acknowledgement.
pub const RECEIVED: &str = "Received";

/// Decode a webhook body into a JSON payload.
///
/// Form bodies carry the JSON in their `payload` field. Anything that cannot
/// be decoded, including unsupported content types, becomes an empty object.
pub fn decode_payload(content_type: Option<&str>, body: &[u8]) -> Value {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();

    let decoded = match mime.as_str() {
        "application/x-www-form-urlencoded" => {
            serde_urlencoded::from_bytes::<HashMap<String, String>>(body)
                .map_err(|e| e.to_string())
                .and_then(|form| {
                    form.get("payload")
                        .ok_or_else(|| "form body has no payload field".to_string())
                        .and_then(|raw| serde_json::from_str(raw).map_err(|e| e.to_string()))
                })
        }
        "application/json" => serde_json::from_slice(body).map_err(|e| e.to_string()),
        other => {
            tracing::debug!(content_type = other, "Unsupported webhook content type");
            return empty_payload();
        }
    };

    decoded.unwrap_or_else(|e| {
        tracing::warn!("Could not decode Slack webhook body: {}", e);
        empty_payload()
    })
}

fn empty_payload() -> Value {
    Value::Object(serde_json::Map::new())
}

/// What the platform gets back.
#[derive(Debug, Clone, PartialEq)]
pub enum Acknowledgement {
    /// URL verification handshake; the challenge is echoed back.
    Challenge(Value),
    Received,
}

impl IntoResponse for Acknowledgement {
    fn into_response(self) -> Response {
        match self {
            Acknowledgement::Challenge(challenge) => {
                let body = serde_json::json!({ "challenge": challenge });
                (StatusCode::OK, Json(body)).into_response()
            }
            Acknowledgement::Received => (StatusCode::OK, Json(RECEIVED)).into_response(),
        }
    }
}

/// Outcome of one request: the acknowledgement to send now and, when events
/// were created, the task forwarding them.
pub struct IngressReceipt {
    pub ack: Acknowledgement,
    pub forwarding: Option<JoinHandle<()>>,
}

struct IngressState {
    creator: EventCreator,
    sink: Arc<dyn EventSink>,
    signing_secret: Option<String>,
    deadline: Duration,
}

#[derive(Clone)]
pub struct WebhookIngress {
    state: Arc<IngressState>,
}

impl WebhookIngress {
    pub fn new(ctx: Arc<ConnectorContext>, sink: Arc<dyn EventSink>) -> Self {
        let signing_secret = ctx.config().signing_secret.clone();
        let deadline = ctx.config().ack_deadline();
        Self {
            state: Arc::new(IngressState {
                creator: EventCreator::new(ctx),
                sink,
                signing_secret,
                deadline,
            }),
        }
    }

    /// Axum router serving the webhook at `path`.
    pub fn router(&self, path: &str) -> Router {
        Router::new()
            .route(path, post(handle_webhook))
            .with_state(self.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Classify one decoded request body and start forwarding its events.
    pub async fn receive(&self, content_type: Option<&str>, body: &[u8]) -> IngressReceipt {
        let payload = decode_payload(content_type, body);
        let payload_type = payload.get("type").and_then(Value::as_str).unwrap_or("");

        let batch = match payload_type {
            "url_verification" => {
                let challenge = payload.get("challenge").cloned().unwrap_or(Value::Null);
                tracing::info!("Answering Slack URL verification challenge");
                return IngressReceipt {
                    ack: Acknowledgement::Challenge(challenge),
                    forwarding: None,
                };
            }
            "event_callback" => match payload.get("event") {
                Some(event) => self.create(event).await,
                None => {
                    tracing::warn!("event_callback payload has no event body");
                    EventBatch::Empty
                }
            },
            t if INTERACTIVE_TYPES.contains(&t) => self.create(&payload).await,
            other => {
                tracing::info!(payload_type = other, "No event created for Slack webhook");
                EventBatch::Empty
            }
        };

        let forwarding = if batch.is_empty() {
            None
        } else {
            let sink = self.state.sink.clone();
            Some(tokio::spawn(forward_all(sink, batch).in_current_span()))
        };

        IngressReceipt {
            ack: Acknowledgement::Received,
            forwarding,
        }
    }

    async fn create(&self, payload: &Value) -> EventBatch {
        let creating = self.state.creator.create_event(payload, None);
        match tokio::time::timeout(self.state.deadline, creating).await {
            Ok(batch) => batch,
            Err(_) => {
                tracing::warn!(
                    deadline_ms = self.state.deadline.as_millis() as u64,
                    "Event creation exceeded the acknowledgement deadline; nothing forwarded"
                );
                EventBatch::Empty
            }
        }
    }

    fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), ConnectorError> {
        let Some(secret) = self.state.signing_secret.as_deref() else {
            return Ok(());
        };
        let header_str = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
        };
        signature::verify_slack_signature(
            secret,
            header_str(TIMESTAMP_HEADER),
            body,
            header_str(SIGNATURE_HEADER),
        )
    }
}

/// Forward each event on its own, in order. A refused event is logged and
/// does not stop the rest.
async fn forward_all(sink: Arc<dyn EventSink>, batch: EventBatch) {
    for event in batch {
        let kind = event.kind();
        if let Err(e) = sink.forward_event(event).await {
            tracing::error!(%kind, "Failed to forward Slack event: {}", e);
        }
    }
}

async fn handle_webhook(
    State(ingress): State<WebhookIngress>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("slack_webhook", %request_id);

    async move {
        if let Err(e) = ingress.verify(&headers, &body) {
            tracing::warn!("Slack signature verification failed: {}", e);
            return (StatusCode::UNAUTHORIZED, "invalid signature").into_response();
        }

        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        let receipt = ingress.receive(content_type, &body).await;
        receipt.ack.into_response()
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::config::SlackConfig;
    use crate::slack::api::{OutgoingCall, SlackMethod};
    use crate::testing::{context_with, test_config, RecordingSink, ScriptedTransport};
    use crate::traits::SlackTransport;
    use crate::types::{ApiResponse, EventKind};

    const JSON: Option<&str> = Some("application/json");

    fn ingress(config: SlackConfig, sink: Arc<RecordingSink>) -> WebhookIngress {
        let transport = Arc::new(ScriptedTransport::new().respond(
            SlackMethod::UsersInfo,
            serde_json::json!({"ok": true, "user": {"id": "U789", "name": "alice"}}),
        ));
        WebhookIngress::new(context_with(config, transport), sink)
    }

    async fn settle(receipt: IngressReceipt) -> Acknowledgement {
        if let Some(forwarding) = receipt.forwarding {
            forwarding.await.unwrap();
        }
        receipt.ack
    }

    fn message_callback() -> Value {
        serde_json::json!({
            "type": "event_callback",
            "event": {
                "type": "message",
                "channel": "C456",
                "user": "U789",
                "text": "hello",
                "ts": "1.0"
            }
        })
    }

    #[test]
    fn decodes_form_payload_field() {
        let form = serde_urlencoded::to_string([("payload", r#"{"type":"view_closed"}"#)]).unwrap();
        let payload = decode_payload(
            Some("application/x-www-form-urlencoded; charset=utf-8"),
            form.as_bytes(),
        );
        assert_eq!(payload, serde_json::json!({"type": "view_closed"}));
    }

    #[test]
    fn undecodable_bodies_are_empty() {
        assert_eq!(
            decode_payload(Some("text/plain"), b"hello"),
            empty_payload()
        );
        assert_eq!(decode_payload(None, b"{}"), empty_payload());
        assert_eq!(decode_payload(JSON, b"not json"), empty_payload());
        assert_eq!(
            decode_payload(Some("application/x-www-form-urlencoded"), b"token=abc"),
            empty_payload()
        );
    }

    #[tokio::test]
    async fn challenge_is_echoed_without_forwarding() {
        let sink = Arc::new(RecordingSink::new());
        let ingress = ingress(test_config(), sink.clone());
        let body = br#"{"type":"url_verification","challenge":"abc"}"#;

        let receipt = ingress.receive(JSON, body).await;
        assert!(receipt.forwarding.is_none());
        assert_eq!(
            receipt.ack,
            Acknowledgement::Challenge(serde_json::json!("abc"))
        );
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn event_callback_forwards_inner_event() {
        let sink = Arc::new(RecordingSink::new());
        let ingress = ingress(test_config(), sink.clone());
        let body = message_callback().to_string();

        let ack = settle(ingress.receive(JSON, body.as_bytes()).await).await;
        assert_eq!(ack, Acknowledgement::Received);
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), EventKind::Message);
        assert_eq!(events[0].user.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn unknown_type_is_acknowledged_without_events() {
        let sink = Arc::new(RecordingSink::new());
        let ingress = ingress(test_config(), sink.clone());

        let body = br#"{"type":"app_rate_limited"}"#;
        let receipt = ingress.receive(JSON, body).await;
        assert!(receipt.forwarding.is_none());
        assert_eq!(receipt.ack, Acknowledgement::Received);
        assert!(sink.events().is_empty());
    }

    // Regression guard: a list of events is forwarded one event at a time.
    #[tokio::test]
    async fn many_events_are_forwarded_individually_in_order() {
        let sink = Arc::new(RecordingSink::new());
        let ingress = ingress(test_config(), sink.clone());
        let payload = serde_json::json!({
            "type": "block_actions",
            "user": {"id": "U789", "name": "alice"},
            "channel": {"id": "C456"},
            "actions": [
                {"action_id": "first", "block_id": "b"},
                {"action_id": "second", "block_id": "b"},
                {"action_id": "third", "block_id": "b"}
            ]
        });
        let form = serde_urlencoded::to_string([("payload", payload.to_string())]).unwrap();

        let form_type = Some("application/x-www-form-urlencoded");
        settle(ingress.receive(form_type, form.as_bytes()).await).await;

        let action_ids: Vec<Option<String>> = sink
            .events()
            .into_iter()
            .map(|event| match event.body {
                crate::types::EventBody::BlockAction { action_id, .. } => action_id,
                other => panic!("expected a block action, got: {:?}", other),
            })
            .collect();
        assert_eq!(
            action_ids,
            vec![
                Some("first".to_string()),
                Some("second".to_string()),
                Some("third".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn refused_forward_still_acknowledges() {
        let sink = Arc::new(RecordingSink::refusing());
        let ingress = ingress(test_config(), sink.clone());
        let body = message_callback().to_string();

        let ack = settle(ingress.receive(JSON, body.as_bytes()).await).await;
        assert_eq!(ack, Acknowledgement::Received);
    }

    struct StalledTransport;

    #[async_trait]
    impl SlackTransport for StalledTransport {
        async fn call(&self, _call: &OutgoingCall) -> Result<ApiResponse, ConnectorError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(serde_json::from_value(serde_json::json!({"ok": true})).unwrap())
        }
    }

    #[tokio::test]
    async fn slow_creation_is_cut_off_at_the_deadline() {
        let sink = Arc::new(RecordingSink::new());
        let config = SlackConfig {
            ack_deadline_ms: 50,
            ..test_config()
        };
        let ctx = Arc::new(ConnectorContext::new(
            config,
            Arc::new(StalledTransport),
            Arc::new(crate::logging::CallLogger::new(None)),
        ));
        let ingress = WebhookIngress::new(ctx, sink.clone());
        let body = message_callback().to_string();

        let started = std::time::Instant::now();
        let receipt = ingress.receive(JSON, body.as_bytes()).await;
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(receipt.forwarding.is_none());
        assert_eq!(receipt.ack, Acknowledgement::Received);
    }

    fn post(body: impl Into<Body>, headers: &[(&str, String)]) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/connector/slack")
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, value);
        }
        builder.body(body.into()).unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn http_acknowledgement_body() {
        let sink = Arc::new(RecordingSink::new());
        let app = ingress(test_config(), sink).router("/connector/slack");

        let response = app
            .oneshot(post(r#"{"type":"something_else"}"#, &[]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, r#""Received""#);
    }

    #[tokio::test]
    async fn http_challenge_body() {
        let sink = Arc::new(RecordingSink::new());
        let app = ingress(test_config(), sink).router("/connector/slack");

        let response = app
            .oneshot(post(r#"{"type":"url_verification","challenge":"abc"}"#, &[]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, r#"{"challenge":"abc"}"#);
    }

    #[tokio::test]
    async fn http_signature_is_enforced_when_configured() {
        let secret = "8f742231b10e8888abcd99yyyzzz85a5";
        let config = SlackConfig {
            signing_secret: Some(secret.to_string()),
            ..test_config()
        };
        let sink = Arc::new(RecordingSink::new());
        let app = ingress(config, sink).router("/connector/slack");
        let body = r#"{"type":"url_verification","challenge":"abc"}"#;

        let unsigned = app.clone().oneshot(post(body, &[])).await.unwrap();
        assert_eq!(unsigned.status(), StatusCode::UNAUTHORIZED);

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let sig = signature::sign(secret, &timestamp, body.as_bytes()).unwrap();
        let signed = app
            .oneshot(post(
                body,
                &[(TIMESTAMP_HEADER, timestamp), (SIGNATURE_HEADER, sig)],
            ))
            .await
            .unwrap();
        assert_eq!(signed.status(), StatusCode::OK);
    }
}
