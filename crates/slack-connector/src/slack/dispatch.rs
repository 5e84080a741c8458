//! Outbound dispatch: one call builder per outgoing event kind.
//!
//! The table is built once and only read afterwards. Each builder
//! validates the fields its kind needs and turns the event into an
//! [`OutgoingCall`]; [`DispatchTable::dispatch`] sends it and judges the
//! platform's answer.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::Instant;

use crate::config::SlackConfig;
use crate::context::ConnectorContext;
use crate::error::ConnectorError;
use crate::logging::CallLogger;
use crate::slack::api::{OutgoingCall, SlackMethod};
use crate::slack::emoji;
use crate::types::{ApiResponse, DomainEvent, EventBody, EventKind};

pub type BuildResult = Result<OutgoingCall, ConnectorError>;

/// Builds the platform call for one event kind.
pub type CallBuilder = fn(&SlackConfig, &DomainEvent) -> BuildResult;

pub struct DispatchTable {
    handlers: HashMap<EventKind, CallBuilder>,
}

impl DispatchTable {
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Table covering every kind in [`EventKind::OUTGOING`].
    pub fn standard() -> Self {
        let mut handlers: HashMap<EventKind, CallBuilder> = HashMap::new();
        handlers.insert(EventKind::Message, send_message);
        handlers.insert(EventKind::EditedMessage, edit_message);
        handlers.insert(EventKind::Blocks, send_blocks);
        handlers.insert(EventKind::EditedBlocks, edit_blocks);
        handlers.insert(EventKind::Reaction, send_reaction);
        handlers.insert(EventKind::NewRoom, create_room);
        handlers.insert(EventKind::RoomName, rename_room);
        handlers.insert(EventKind::JoinRoom, join_room);
        handlers.insert(EventKind::UserInvite, invite_user);
        handlers.insert(EventKind::RoomDescription, set_room_topic);
        handlers.insert(EventKind::PinMessage, pin_message);
        handlers.insert(EventKind::UnpinMessage, unpin_message);
        Self { handlers }
    }

    /// Register the builder for `kind`. A kind has at most one builder.
    pub fn register(
        &mut self,
        kind: EventKind,
        builder: CallBuilder,
    ) -> Result<(), ConnectorError> {
        match self.handlers.entry(kind) {
            Entry::Occupied(_) => Err(ConnectorError::DuplicateHandler(kind)),
            Entry::Vacant(slot) => {
                slot.insert(builder);
                Ok(())
            }
        }
    }

    pub fn is_registered(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn build_call(&self, config: &SlackConfig, event: &DomainEvent) -> BuildResult {
        let kind = event.kind();
        let builder = self
            .handlers
            .get(&kind)
            .ok_or(ConnectorError::Unregistered(kind))?;
        builder(config, event)
    }

    /// Send `event` and return the platform's raw response.
    ///
    /// Unsuccessful responses become `ConnectorError::Api`, except error
    /// codes the call marks as soft failures, which are logged and returned.
    pub async fn dispatch(
        &self,
        ctx: &ConnectorContext,
        event: &DomainEvent,
    ) -> Result<ApiResponse, ConnectorError> {
        let kind = event.kind();
        let call = self.build_call(ctx.config(), event)?;
        let channel = call.get("channel").map(str::to_string);

        tracing::debug!(
            kind = %kind,
            method = %call.method,
            channel = channel.as_deref().unwrap_or("-"),
            "Dispatching outgoing event"
        );

        let started = Instant::now();
        let result = ctx.client().call(&call).await;
        let method = call.method.as_str();

        let resp = match result {
            Ok(resp) => resp,
            Err(e) => {
                ctx.call_log()
                    .log(&CallLogger::entry(
                        method,
                        channel.as_deref(),
                        false,
                        started.elapsed(),
                        Some(e.to_string()),
                    ))
                    .await;
                return Err(e);
            }
        };

        ctx.call_log()
            .log(&CallLogger::entry(
                method,
                channel.as_deref(),
                resp.ok,
                started.elapsed(),
                resp.error.clone(),
            ))
            .await;

        if resp.ok {
            return Ok(resp);
        }

        if call.is_soft_failure(resp.error.as_deref()) {
            tracing::warn!(
                method,
                error = resp.error.as_deref().unwrap_or("unknown"),
                name = call.get("name").unwrap_or("-"),
                "Slack declined the call; continuing"
            );
            return Ok(resp);
        }

        Err(ConnectorError::Api {
            method: method.to_string(),
            error: resp.error_code(),
            response: resp.to_value(),
        })
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::standard()
    }
}

fn channel_of(config: &SlackConfig, event: &DomainEvent) -> String {
    event
        .target
        .clone()
        .unwrap_or_else(|| config.default_room.clone())
}

fn linked_ts(event: &DomainEvent) -> Result<&str, ConnectorError> {
    event
        .linked_event
        .as_ref()
        .and_then(|linked| linked.event_id.as_deref())
        .ok_or(ConnectorError::MissingField {
            kind: event.kind(),
            field: "linked_event",
        })
}

fn wrong_body(expected: EventKind, event: &DomainEvent) -> ConnectorError {
    let kind = event.kind();
    ConnectorError::Internal(format!("{} builder received a {} event", expected, kind))
}

/// Thread to post a reply into.
///
/// An existing thread of the linked event wins (unless the linked event is
/// the thread root); otherwise a new thread under the linked event is
/// started only when `start_thread` is set.
///
/// A linked thread root with `start_thread` set gets the reply in its own
/// thread; earlier connector versions sent such replies unthreaded.
fn reply_thread(config: &SlackConfig, event: &DomainEvent) -> Option<String> {
    let linked = event.linked_event.as_ref()?;
    match linked.thread_marker() {
        Some(marker) if !linked.is_thread_root() => Some(marker.to_string()),
        _ if config.start_thread => linked.event_id.clone(),
        _ => None,
    }
}

fn send_message(config: &SlackConfig, event: &DomainEvent) -> BuildResult {
    let EventBody::Message { text } = &event.body else {
        return Err(wrong_body(EventKind::Message, event));
    };

    let mut call = OutgoingCall::new(SlackMethod::ChatPostMessage)
        .param("channel", channel_of(config, event))
        .param("text", text.as_str())
        .param("username", config.bot_name.as_str())
        .param("icon_emoji", config.icon_emoji.as_str());

    if let Some(thread_ts) = reply_thread(config, event) {
        call = call.param("thread_ts", thread_ts);
    }
    Ok(call)
}

fn edit_message(config: &SlackConfig, event: &DomainEvent) -> BuildResult {
    let EventBody::EditedMessage { text } = &event.body else {
        return Err(wrong_body(EventKind::EditedMessage, event));
    };

    Ok(OutgoingCall::new(SlackMethod::ChatUpdate)
        .param("channel", channel_of(config, event))
        .param("ts", linked_ts(event)?)
        .param("text", text.as_str()))
}

fn send_blocks(config: &SlackConfig, event: &DomainEvent) -> BuildResult {
    let EventBody::Blocks { blocks } = &event.body else {
        return Err(wrong_body(EventKind::Blocks, event));
    };

    Ok(OutgoingCall::new(SlackMethod::ChatPostMessage)
        .param("channel", channel_of(config, event))
        .param("username", config.bot_name.as_str())
        .param("icon_emoji", config.icon_emoji.as_str())
        .param("blocks", blocks.to_string()))
}

fn edit_blocks(config: &SlackConfig, event: &DomainEvent) -> BuildResult {
    let EventBody::EditedBlocks { blocks } = &event.body else {
        return Err(wrong_body(EventKind::EditedBlocks, event));
    };

    Ok(OutgoingCall::new(SlackMethod::ChatUpdate)
        .param("channel", channel_of(config, event))
        .param("ts", linked_ts(event)?)
        .param("blocks", blocks.to_string()))
}

fn send_reaction(config: &SlackConfig, event: &DomainEvent) -> BuildResult {
    let EventBody::Reaction { emoji } = &event.body else {
        return Err(wrong_body(EventKind::Reaction, event));
    };

    let name = emoji::to_short_code(emoji);
    tracing::debug!(name = %name, "Reacting");

    Ok(OutgoingCall::new(SlackMethod::ReactionsAdd)
        .param("channel", channel_of(config, event))
        .param("name", name)
        .param("timestamp", linked_ts(event)?)
        .tolerate(&["invalid_name"]))
}

fn create_room(_config: &SlackConfig, event: &DomainEvent) -> BuildResult {
    let EventBody::NewRoom { name } = &event.body else {
        return Err(wrong_body(EventKind::NewRoom, event));
    };

    Ok(OutgoingCall::new(SlackMethod::ConversationsCreate).param("name", name.as_str()))
}

fn rename_room(config: &SlackConfig, event: &DomainEvent) -> BuildResult {
    let EventBody::RoomName { name } = &event.body else {
        return Err(wrong_body(EventKind::RoomName, event));
    };

    Ok(OutgoingCall::new(SlackMethod::ConversationsRename)
        .param("channel", channel_of(config, event))
        .param("name", name.as_str()))
}

fn join_room(config: &SlackConfig, event: &DomainEvent) -> BuildResult {
    let EventBody::JoinRoom = &event.body else {
        return Err(wrong_body(EventKind::JoinRoom, event));
    };

    Ok(OutgoingCall::new(SlackMethod::ConversationsJoin)
        .param("channel", channel_of(config, event)))
}

fn invite_user(config: &SlackConfig, event: &DomainEvent) -> BuildResult {
    let EventBody::UserInvite { user_id } = &event.body else {
        return Err(wrong_body(EventKind::UserInvite, event));
    };

    Ok(OutgoingCall::new(SlackMethod::ConversationsInvite)
        .param("channel", channel_of(config, event))
        .param("users", user_id.as_str()))
}

fn set_room_topic(config: &SlackConfig, event: &DomainEvent) -> BuildResult {
    let EventBody::RoomDescription { description } = &event.body else {
        return Err(wrong_body(EventKind::RoomDescription, event));
    };

    Ok(OutgoingCall::new(SlackMethod::ConversationsSetTopic)
        .param("channel", channel_of(config, event))
        .param("topic", description.as_str()))
}

fn pin_message(config: &SlackConfig, event: &DomainEvent) -> BuildResult {
    let EventBody::PinMessage = &event.body else {
        return Err(wrong_body(EventKind::PinMessage, event));
    };

    Ok(OutgoingCall::new(SlackMethod::PinsAdd)
        .param("channel", channel_of(config, event))
        .param("timestamp", linked_ts(event)?))
}

fn unpin_message(config: &SlackConfig, event: &DomainEvent) -> BuildResult {
    let EventBody::UnpinMessage = &event.body else {
        return Err(wrong_body(EventKind::UnpinMessage, event));
    };

    Ok(OutgoingCall::new(SlackMethod::PinsRemove)
        .param("channel", channel_of(config, event))
        .param("timestamp", linked_ts(event)?))
}
