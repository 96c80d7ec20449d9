use std::sync::Arc;

use axum::extract::ws::Message;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::todo_list::TodoListId;

pub const PING_MESSAGE: &str = "ping";
pub const PONG_MESSAGE: &str = "pong";

/// Browsers usually send list IDs taken from the URL, so accept both `5` and `"5"`.
#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Number(i32),
    Text(String),
}

impl IdRepr {
    fn into_id(self) -> Option<TodoListId> {
        match self {
            IdRepr::Number(n) => Some(TodoListId(n)),
            IdRepr::Text(s) => s.trim().parse().ok(),
        }
    }
}

fn deserialize_list_id<'de, D>(deserializer: D) -> Result<TodoListId, D::Error>
where
    D: Deserializer<'de>,
{
    IdRepr::deserialize(deserializer)?
        .into_id()
        .ok_or_else(|| serde::de::Error::custom("invalid list id"))
}

/// A message sent by a client
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Start receiving events for a list
    JoinList {
        #[serde(rename = "listId", deserialize_with = "deserialize_list_id")]
        list_id: TodoListId,
    },
    /// Stop receiving events for a list
    LeaveList {
        #[serde(rename = "listId", deserialize_with = "deserialize_list_id")]
        list_id: TodoListId,
    },
    /// Relay a created todo to the other members of its list's room
    TodoCreated { data: Value },
    /// Relay an updated todo to the other members of its list's room
    TodoUpdated { data: Value },
}

/// Find the list a relayed todo belongs to
pub fn relayed_list_id(data: &Value) -> Option<TodoListId> {
    let raw = data.get("list_id")?;
    IdRepr::deserialize(raw).ok()?.into_id()
}

/// A JSON event sent to clients
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    TodoCreated { data: Value },
    TodoUpdated { data: Value },
    Error { message: String },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }
}

/// Anything that can be queued for delivery to a single connection
#[derive(Debug, Clone)]
pub enum OutgoingMessage {
    Pong,
    Event(Arc<ServerEvent>),
}

impl From<ServerEvent> for OutgoingMessage {
    fn from(event: ServerEvent) -> Self {
        OutgoingMessage::Event(Arc::new(event))
    }
}

impl TryFrom<OutgoingMessage> for Message {
    type Error = serde_json::Error;

    fn try_from(msg: OutgoingMessage) -> Result<Self, Self::Error> {
        match msg {
            OutgoingMessage::Pong => Ok(Message::Text(PONG_MESSAGE.to_string())),
            OutgoingMessage::Event(event) => serde_json::to_string(&*event).map(Message::Text),
        }
    }
}
