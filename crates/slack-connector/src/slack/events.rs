//! Slack payload to domain event conversion.
//!
//! Handles the inner `event` of Events API callbacks (messages and their
//! subtypes, channel creation, reactions) and the interactive payloads
//! (`block_actions`, `message_action`, `view_submission`, `view_closed`),
//! which arrive whole and are shaped differently.

use std::sync::Arc;

use serde_json::Value;

use crate::context::ConnectorContext;
use crate::error::ConnectorError;
use crate::slack::emoji;
use crate::types::{DomainEvent, EventBatch, EventBody, LinkedEvent};

/// Interactive payload types, passed to the creator without unwrapping.
pub const INTERACTIVE_TYPES: [&str; 4] = [
    "block_actions",
    "message_action",
    "view_submission",
    "view_closed",
];

pub struct EventCreator {
    ctx: Arc<ConnectorContext>,
}

impl EventCreator {
    pub fn new(ctx: Arc<ConnectorContext>) -> Self {
        Self { ctx }
    }

    /// Convert one payload into zero, one or many events.
    ///
    /// Unknown payload types and payloads missing required fields produce
    /// an empty batch and a log line; they never fail the caller.
    /// `target` overrides the channel taken from the payload.
    pub async fn create_event(&self, payload: &Value, target: Option<&str>) -> EventBatch {
        let payload_type = payload.get("type").and_then(Value::as_str).unwrap_or("");

        let result = match payload_type {
            "message" => self.message(payload).await,
            "channel_created" => channel_created(payload),
            "reaction_added" => self.reaction_added(payload).await,
            "block_actions" => block_actions(payload),
            "message_action" => message_action(payload),
            "view_submission" | "view_closed" => view_event(payload_type, payload),
            other => {
                tracing::info!(
                    payload_type = other,
                    "Slack payload type is not implemented; no event created"
                );
                return EventBatch::Empty;
            }
        };

        match result {
            Ok(batch) => match target {
                Some(target) => retarget(batch, target),
                None => batch,
            },
            Err(e) => {
                tracing::warn!(
                    payload_type,
                    "Could not create event from Slack payload: {}",
                    e
                );
                EventBatch::Empty
            }
        }
    }

    async fn message(&self, payload: &Value) -> Result<EventBatch, ConnectorError> {
        let body = match str_field(payload, "subtype") {
            None | Some("bot_message") | Some("thread_broadcast") | Some("file_share") => {
                return self.new_message(payload).await;
            }
            Some("message_changed") => return self.edited_message(payload).await,
            Some("channel_join") => EventBody::JoinRoom,
            Some("channel_name") => EventBody::RoomName {
                name: required(payload, "name")?.to_string(),
            },
            Some("channel_topic") => EventBody::RoomDescription {
                description: required(payload, "topic")?.to_string(),
            },
            Some("pinned_item") => EventBody::PinMessage,
            Some("unpinned_item") => EventBody::UnpinMessage,
            Some(other) => {
                tracing::debug!(subtype = other, "Ignoring Slack message subtype");
                return Ok(EventBatch::Empty);
            }
        };

        let pinning = matches!(body, EventBody::PinMessage | EventBody::UnpinMessage);
        let mut event = self.room_event(payload, body).await?;
        if let Some(ts) = pinned_item_ts(payload).filter(|_| pinning) {
            event = event.linked_to(LinkedEvent::new(ts));
        }
        Ok(EventBatch::Single(event))
    }

    async fn new_message(&self, payload: &Value) -> Result<EventBatch, ConnectorError> {
        if self.is_own_message(payload).await {
            tracing::debug!("Ignoring message sent by this bot");
            return Ok(EventBatch::Empty);
        }

        let channel = required(payload, "channel")?;
        let ts = required(payload, "ts")?;
        let text = str_field(payload, "text").unwrap_or("");
        let text = self.readable_text(text).await;

        let mut event = DomainEvent::message(text)
            .to(channel)
            .with_id(ts)
            .with_raw(payload.clone());

        if str_field(payload, "subtype") == Some("bot_message") {
            let name = str_field(payload, "username")
                .or_else(|| str_field(payload, "bot_id"))
                .unwrap_or("bot");
            let id = str_field(payload, "bot_id").unwrap_or(name);
            event = event.from_user(id, name);
        } else if let Some(user_id) = str_field(payload, "user") {
            let name = self.user_name(user_id).await;
            event = event.from_user(user_id, name);
        }

        Ok(EventBatch::Single(event))
    }

    async fn edited_message(&self, payload: &Value) -> Result<EventBatch, ConnectorError> {
        let channel = required(payload, "channel")?;
        let inner = payload
            .get("message")
            .ok_or_else(|| missing("message_changed", "message"))?;

        if self.is_own_message(inner).await {
            return Ok(EventBatch::Empty);
        }

        let original_ts = required(inner, "ts")?;
        let text = str_field(inner, "text").unwrap_or("");
        let text = self.readable_text(text).await;

        let mut event = DomainEvent::new(EventBody::EditedMessage { text })
            .to(channel)
            .linked_to(LinkedEvent::new(original_ts).with_raw(inner.clone()))
            .with_raw(payload.clone());
        let event_ts = str_field(payload, "event_ts");
        if let Some(event_ts) = event_ts.or_else(|| str_field(payload, "ts")) {
            event = event.with_id(event_ts);
        }
        if let Some(user_id) = str_field(inner, "user") {
            let name = self.user_name(user_id).await;
            event = event.from_user(user_id, name);
        }

        Ok(EventBatch::Single(event))
    }

    /// Channel-scoped message subtypes: channel, ts and (optionally) user.
    async fn room_event(
        &self,
        payload: &Value,
        body: EventBody,
    ) -> Result<DomainEvent, ConnectorError> {
        let channel = required(payload, "channel")?;
        let mut event = DomainEvent::new(body).to(channel).with_raw(payload.clone());
        if let Some(ts) = str_field(payload, "ts") {
            event = event.with_id(ts);
        }
        if let Some(user_id) = str_field(payload, "user") {
            let name = self.user_name(user_id).await;
            event = event.from_user(user_id, name);
        }
        Ok(event)
    }

    async fn reaction_added(&self, payload: &Value) -> Result<EventBatch, ConnectorError> {
        let reaction = required(payload, "reaction")?;
        let item = payload
            .get("item")
            .ok_or_else(|| missing("reaction_added", "item"))?;
        let channel = required(item, "channel")?;
        let item_ts = required(item, "ts")?;

        let mut event = DomainEvent::new(EventBody::Reaction {
            emoji: emoji::to_glyph(reaction),
        })
        .to(channel)
        .linked_to(LinkedEvent::new(item_ts).with_raw(item.clone()))
        .with_raw(payload.clone());
        if let Some(event_ts) = str_field(payload, "event_ts") {
            event = event.with_id(event_ts);
        }
        if let Some(user_id) = str_field(payload, "user") {
            let name = self.user_name(user_id).await;
            event = event.from_user(user_id, name);
        }

        Ok(EventBatch::Single(event))
    }

    async fn is_own_message(&self, message: &Value) -> bool {
        match (str_field(message, "bot_id"), self.ctx.bot_id().await) {
            (Some(sender), Some(own)) => sender == own,
            _ => false,
        }
    }

    /// Display name for a user id, falling back to the id when lookup fails.
    async fn user_name(&self, user_id: &str) -> String {
        match self.ctx.resolve_user(user_id).await {
            Ok(profile) => profile.name,
            Err(e) => {
                tracing::warn!(user_id, "Could not resolve Slack user: {}", e);
                user_id.to_string()
            }
        }
    }

    /// Message text with mentions replaced by names, or unchanged when a
    /// mention cannot be resolved.
    async fn readable_text(&self, text: &str) -> String {
        match self.ctx.substitute_names(text).await {
            Ok(replaced) => replaced,
            Err(e) => {
                tracing::warn!("Keeping raw mentions in message text: {}", e);
                text.to_string()
            }
        }
    }
}

fn channel_created(payload: &Value) -> Result<EventBatch, ConnectorError> {
    let channel = payload
        .get("channel")
        .ok_or_else(|| missing("channel_created", "channel"))?;
    let name = required(channel, "name")?;

    let mut event = DomainEvent::new(EventBody::NewRoom {
        name: name.to_string(),
    })
    .with_raw(payload.clone());
    if let Some(id) = str_field(channel, "id") {
        event = event.to(id);
    }
    if let Some(creator) = str_field(channel, "creator") {
        event.user_id = Some(creator.to_string());
    }
    Ok(EventBatch::Single(event))
}

/// One event per action in the payload.
fn block_actions(payload: &Value) -> Result<EventBatch, ConnectorError> {
    let actions = payload
        .get("actions")
        .and_then(Value::as_array)
        .ok_or_else(|| missing("block_actions", "actions"))?;

    let events: Vec<DomainEvent> = actions
        .iter()
        .map(|action| {
            let body = EventBody::BlockAction {
                action_id: str_field(action, "action_id").map(str::to_string),
                block_id: str_field(action, "block_id").map(str::to_string),
                value: action
                    .get("value")
                    .or_else(|| action.get("selected_option"))
                    .or_else(|| action.get("selected_options"))
                    .cloned(),
            };
            interactive_event(payload, body)
        })
        .collect();

    Ok(match events.len() {
        0 => EventBatch::Empty,
        _ => EventBatch::Many(events),
    })
}

fn message_action(payload: &Value) -> Result<EventBatch, ConnectorError> {
    let body = EventBody::MessageAction {
        callback_id: str_field(payload, "callback_id").map(str::to_string),
    };
    Ok(EventBatch::Single(interactive_event(payload, body)))
}

fn view_event(payload_type: &str, payload: &Value) -> Result<EventBatch, ConnectorError> {
    let view = payload
        .get("view")
        .cloned()
        .ok_or_else(|| missing(payload_type, "view"))?;
    let body = if payload_type == "view_submission" {
        EventBody::ViewSubmission { view }
    } else {
        EventBody::ViewClosed { view }
    };
    Ok(EventBatch::Single(interactive_event(payload, body)))
}

/// Common fields of interactive payloads: `user`, `channel` and `message`
/// are objects here rather than plain ids.
fn interactive_event(payload: &Value, body: EventBody) -> DomainEvent {
    let mut event = DomainEvent::new(body).with_raw(payload.clone());

    if let Some(channel) = payload.pointer("/channel/id").and_then(Value::as_str) {
        event = event.to(channel);
    }
    if let Some(user) = payload.get("user") {
        event.user_id = str_field(user, "id").map(str::to_string);
        event.user = str_field(user, "name")
            .or_else(|| str_field(user, "username"))
            .map(str::to_string);
    }
    if let Some(message) = payload.get("message") {
        if let Some(ts) = str_field(message, "ts") {
            event = event.linked_to(LinkedEvent::new(ts).with_raw(message.clone()));
        }
    }
    if let Some(trigger) = str_field(payload, "trigger_id") {
        event = event.with_id(trigger);
    }
    event
}

fn pinned_item_ts(payload: &Value) -> Option<&str> {
    payload
        .pointer("/item/message/ts")
        .or_else(|| payload.pointer("/item/ts"))
        .and_then(Value::as_str)
}

fn retarget(batch: EventBatch, target: &str) -> EventBatch {
    match batch {
        EventBatch::Empty => EventBatch::Empty,
        EventBatch::Single(event) => EventBatch::Single(event.to(target)),
        EventBatch::Many(events) => {
            EventBatch::Many(events.into_iter().map(|e| e.to(target)).collect())
        }
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn required<'a>(value: &'a Value, key: &'static str) -> Result<&'a str, ConnectorError> {
    let kind = str_field(value, "subtype")
        .or_else(|| str_field(value, "type"))
        .unwrap_or("payload");
    str_field(value, key).ok_or_else(|| missing(kind, key))
}

fn missing(kind: &str, field: &str) -> ConnectorError {
    ConnectorError::ParseError(format!("{} is missing `{}`", kind, field))
}
