use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Concrete variant tag of a [`DomainEvent`], used as the dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Message,
    EditedMessage,
    Blocks,
    EditedBlocks,
    Reaction,
    NewRoom,
    RoomName,
    JoinRoom,
    UserInvite,
    RoomDescription,
    PinMessage,
    UnpinMessage,
    BlockAction,
    MessageAction,
    ViewSubmission,
    ViewClosed,
}

impl EventKind {
    /// Every kind the connector knows how to send to the platform.
    pub const OUTGOING: [EventKind; 12] = [
        EventKind::Message,
        EventKind::EditedMessage,
        EventKind::Blocks,
        EventKind::EditedBlocks,
        EventKind::Reaction,
        EventKind::NewRoom,
        EventKind::RoomName,
        EventKind::JoinRoom,
        EventKind::UserInvite,
        EventKind::RoomDescription,
        EventKind::PinMessage,
        EventKind::UnpinMessage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Message => "message",
            EventKind::EditedMessage => "edited_message",
            EventKind::Blocks => "blocks",
            EventKind::EditedBlocks => "edited_blocks",
            EventKind::Reaction => "reaction",
            EventKind::NewRoom => "new_room",
            EventKind::RoomName => "room_name",
            EventKind::JoinRoom => "join_room",
            EventKind::UserInvite => "user_invite",
            EventKind::RoomDescription => "room_description",
            EventKind::PinMessage => "pin_message",
            EventKind::UnpinMessage => "unpin_message",
            EventKind::BlockAction => "block_action",
            EventKind::MessageAction => "message_action",
            EventKind::ViewSubmission => "view_submission",
            EventKind::ViewClosed => "view_closed",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Variant-specific content of a [`DomainEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventBody {
    Message { text: String },
    EditedMessage { text: String },
    /// Block Kit layout, kept as the platform's JSON structure.
    Blocks { blocks: serde_json::Value },
    EditedBlocks { blocks: serde_json::Value },
    /// `emoji` is a Unicode glyph, or a bare short code when no glyph is known.
    Reaction { emoji: String },
    NewRoom { name: String },
    RoomName { name: String },
    JoinRoom,
    UserInvite { user_id: String },
    RoomDescription { description: String },
    PinMessage,
    UnpinMessage,
    BlockAction {
        action_id: Option<String>,
        block_id: Option<String>,
        value: Option<serde_json::Value>,
    },
    MessageAction { callback_id: Option<String> },
    ViewSubmission { view: serde_json::Value },
    ViewClosed { view: serde_json::Value },
}

impl EventBody {
    pub fn kind(&self) -> EventKind {
        match self {
            EventBody::Message { .. } => EventKind::Message,
            EventBody::EditedMessage { .. } => EventKind::EditedMessage,
            EventBody::Blocks { .. } => EventKind::Blocks,
            EventBody::EditedBlocks { .. } => EventKind::EditedBlocks,
            EventBody::Reaction { .. } => EventKind::Reaction,
            EventBody::NewRoom { .. } => EventKind::NewRoom,
            EventBody::RoomName { .. } => EventKind::RoomName,
            EventBody::JoinRoom => EventKind::JoinRoom,
            EventBody::UserInvite { .. } => EventKind::UserInvite,
            EventBody::RoomDescription { .. } => EventKind::RoomDescription,
            EventBody::PinMessage => EventKind::PinMessage,
            EventBody::UnpinMessage => EventKind::UnpinMessage,
            EventBody::BlockAction { .. } => EventKind::BlockAction,
            EventBody::MessageAction { .. } => EventKind::MessageAction,
            EventBody::ViewSubmission { .. } => EventKind::ViewSubmission,
            EventBody::ViewClosed { .. } => EventKind::ViewClosed,
        }
    }
}

/// A typed chat event, either parsed from a webhook or built by the
/// application for sending.
///
/// Events are assembled with the consuming builder methods and not mutated
/// after that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Platform identifier of the event (a message `ts` for messages).
    pub event_id: Option<String>,
    /// Destination room/channel. Outgoing events without one go to the
    /// configured default room.
    pub target: Option<String>,
    pub user_id: Option<String>,
    /// Display name of the sender.
    pub user: Option<String>,
    pub linked_event: Option<LinkedEvent>,
    /// Platform-native payload the event was created from.
    #[serde(default)]
    pub raw_payload: serde_json::Value,
    pub body: EventBody,
}

impl DomainEvent {
    pub fn new(body: EventBody) -> Self {
        Self {
            event_id: None,
            target: None,
            user_id: None,
            user: None,
            linked_event: None,
            raw_payload: serde_json::Value::Null,
            body,
        }
    }

    pub fn message(text: impl Into<String>) -> Self {
        Self::new(EventBody::Message { text: text.into() })
    }

    pub fn to(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    pub fn from_user(mut self, user_id: impl Into<String>, user: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self.user = Some(user.into());
        self
    }

    pub fn linked_to(mut self, linked: LinkedEvent) -> Self {
        self.linked_event = Some(linked);
        self
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw_payload = raw;
        self
    }

    pub fn kind(&self) -> EventKind {
        self.body.kind()
    }
}

/// Weak reference to an earlier event: its id plus an optional snapshot of
/// its raw payload. The connector never holds event history itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkedEvent {
    pub event_id: Option<String>,
    #[serde(default)]
    pub raw_payload: Option<serde_json::Value>,
}

impl LinkedEvent {
    pub fn new(event_id: impl Into<String>) -> Self {
        Self {
            event_id: Some(event_id.into()),
            raw_payload: None,
        }
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw_payload = Some(raw);
        self
    }

    /// The `thread_ts` of the thread this event belongs to, if any.
    pub fn thread_marker(&self) -> Option<&str> {
        self.raw_payload
            .as_ref()
            .and_then(|raw| raw.get("thread_ts"))
            .and_then(|ts| ts.as_str())
    }

    /// True when the linked event is itself the root of its thread.
    pub fn is_thread_root(&self) -> bool {
        match (self.thread_marker(), self.event_id.as_deref()) {
            (Some(marker), Some(id)) => marker == id,
            _ => false,
        }
    }
}

impl From<&DomainEvent> for LinkedEvent {
    fn from(event: &DomainEvent) -> Self {
        Self {
            event_id: event.event_id.clone(),
            raw_payload: Some(event.raw_payload.clone()),
        }
    }
}

/// What the event creator produced for one inbound payload.
#[derive(Debug, Clone, PartialEq)]
pub enum EventBatch {
    Empty,
    Single(DomainEvent),
    Many(Vec<DomainEvent>),
}

impl EventBatch {
    pub fn len(&self) -> usize {
        match self {
            EventBatch::Empty => 0,
            EventBatch::Single(_) => 1,
            EventBatch::Many(events) => events.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Option<DomainEvent>> for EventBatch {
    fn from(event: Option<DomainEvent>) -> Self {
        match event {
            Some(event) => EventBatch::Single(event),
            None => EventBatch::Empty,
        }
    }
}

impl IntoIterator for EventBatch {
    type Item = DomainEvent;
    type IntoIter = std::vec::IntoIter<DomainEvent>;

    fn into_iter(self) -> Self::IntoIter {
        match self {
            EventBatch::Empty => Vec::new().into_iter(),
            EventBatch::Single(event) => vec![event].into_iter(),
            EventBatch::Many(events) => events.into_iter(),
        }
    }
}

/// A Slack user record as returned by `users.info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub profile: serde_json::Value,
}

/// Who the connector is authenticated as, learned during `connect()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotIdentity {
    pub user_id: String,
    pub bot_id: String,
    pub user: Option<String>,
    pub team: Option<String>,
}

/// Raw Slack Web API response. `ok` is the success indicator; everything
/// else the platform returned is kept in `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl ApiResponse {
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Slack's `error` code, or "unknown" when the failure carried none.
    pub fn error_code(&self) -> String {
        self.error.as_deref().unwrap_or("unknown").to_string()
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// One structured audit record per outbound platform call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallLog {
    pub ts: DateTime<Utc>,
    pub method: String,
    pub channel: Option<String>,
    pub success: bool,
    pub duration_ms: Option<u64>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_display() {
        assert_eq!(EventKind::EditedBlocks.to_string(), "edited_blocks");
        assert_eq!(EventKind::Message.to_string(), "message");
    }

    #[test]
    fn outgoing_kinds_exclude_interactions() {
        assert!(!EventKind::OUTGOING.contains(&EventKind::BlockAction));
        assert!(!EventKind::OUTGOING.contains(&EventKind::ViewClosed));
        assert!(EventKind::OUTGOING.contains(&EventKind::UnpinMessage));
    }

    #[test]
    fn builder_sets_common_fields() {
        let event = DomainEvent::message("hi")
            .to("C123")
            .with_id("1582838099.000600")
            .from_user("U1", "alice");
        assert_eq!(event.kind(), EventKind::Message);
        assert_eq!(event.target.as_deref(), Some("C123"));
        assert_eq!(event.event_id.as_deref(), Some("1582838099.000600"));
        assert_eq!(event.user.as_deref(), Some("alice"));
        assert!(event.linked_event.is_none());
    }

    #[test]
    fn linked_event_thread_marker() {
        let inside = LinkedEvent::new("1582838099.000601")
            .with_raw(serde_json::json!({"thread_ts": "1582838099.000600"}));
        assert_eq!(inside.thread_marker(), Some("1582838099.000600"));
        assert!(!inside.is_thread_root());

        let root = LinkedEvent::new("1582838099.000600")
            .with_raw(serde_json::json!({"thread_ts": "1582838099.000600"}));
        assert!(root.is_thread_root());

        let plain = LinkedEvent::new("1582838099.000600");
        assert_eq!(plain.thread_marker(), None);
    }

    #[test]
    fn linked_event_snapshots_source_event() {
        let source = DomainEvent::message("original")
            .with_id("111.222")
            .with_raw(serde_json::json!({"ts": "111.222", "thread_ts": "111.000"}));
        let linked = LinkedEvent::from(&source);
        assert_eq!(linked.event_id.as_deref(), Some("111.222"));
        assert_eq!(linked.thread_marker(), Some("111.000"));
    }

    #[test]
    fn event_batch_iterates_every_element() {
        let batch = EventBatch::Many(vec![DomainEvent::message("a"), DomainEvent::message("b")]);
        assert_eq!(batch.len(), 2);
        let texts: Vec<_> = batch
            .into_iter()
            .map(|e| match e.body {
                EventBody::Message { text } => text,
                _ => String::new(),
            })
            .collect();
        assert_eq!(texts, vec!["a", "b"]);

        assert!(EventBatch::Empty.is_empty());
        assert_eq!(EventBatch::from(Some(DomainEvent::message("x"))).len(), 1);
    }

    #[test]
    fn api_response_keeps_extra_fields() {
        let json = r#"{"ok":true,"ts":"1234567890.123456","channel":"C456"}"#;
        let resp: ApiResponse = serde_json::from_str(json).unwrap();
        assert!(resp.ok);
        assert!(resp.error.is_none());
        assert_eq!(
            resp.get("ts").and_then(|v| v.as_str()),
            Some("1234567890.123456")
        );
    }

    #[test]
    fn api_response_error() {
        let json = r#"{"ok":false,"error":"channel_not_found"}"#;
        let resp: ApiResponse = serde_json::from_str(json).unwrap();
        assert!(!resp.ok);
        assert_eq!(resp.error.as_deref(), Some("channel_not_found"));
        assert_eq!(resp.to_value()["error"], "channel_not_found");
        assert_eq!(resp.error_code(), "channel_not_found");

        let bare: ApiResponse = serde_json::from_str(r#"{"ok":false}"#).unwrap();
        assert_eq!(bare.error_code(), "unknown");
    }

    #[test]
    fn user_profile_from_users_info() {
        let json = r#"{"id":"U01NK1K9L68","name":"Test User","profile":{"bot_id":"B1"}}"#;
        let user: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(user.name, "Test User");
        assert!(!user.is_bot);
        assert_eq!(user.profile["bot_id"], "B1");
    }

    #[test]
    fn domain_event_serialization() {
        let event = DomainEvent::new(EventBody::Reaction {
            emoji: "😀".to_string(),
        })
        .to("room");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"reaction\""));
        let parsed: DomainEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
