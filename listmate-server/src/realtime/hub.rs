use std::{collections::HashSet, sync::Arc};

use dashmap::DashMap;
use tokio::sync::mpsc::{error::TrySendError, Sender};
use tracing::{event, Level};
use uuid::Uuid;

use super::messages::{OutgoingMessage, ServerEvent};
use crate::models::todo_list::TodoListId;

/// Identifies a single WebSocket connection
pub type ConnectionId = Uuid;

/// Tracks open connections and the list rooms they have joined. Cloning the hub is cheap and
/// every clone shares the same state.
#[derive(Clone, Default)]
pub struct RoomHub {
    connections: Arc<DashMap<ConnectionId, Sender<OutgoingMessage>>>,
    rooms: Arc<DashMap<TodoListId, HashSet<ConnectionId>>>,
}

impl RoomHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. Messages for it are queued on `sender`.
    pub fn add_connection(&self, id: ConnectionId, sender: Sender<OutgoingMessage>) {
        self.connections.insert(id, sender);
        event!(Level::DEBUG, connection_id=%id, connections=self.connections.len(), "added connection");
    }

    /// Remove a connection from the hub and from every room it joined. Rooms left empty are
    /// dropped.
    pub fn remove_connection(&self, id: ConnectionId) {
        self.connections.remove(&id);
        self.rooms.retain(|_, members| {
            members.remove(&id);
            !members.is_empty()
        });
        event!(Level::DEBUG, connection_id=%id, connections=self.connections.len(), "removed connection");
    }

    pub fn join(&self, id: ConnectionId, list_id: TodoListId) {
        self.rooms.entry(list_id).or_default().insert(id);
        event!(Level::DEBUG, connection_id=%id, %list_id, "joined room");
    }

    pub fn leave(&self, id: ConnectionId, list_id: TodoListId) {
        if let Some(mut members) = self.rooms.get_mut(&list_id) {
            members.remove(&id);
        }
        self.rooms.remove_if(&list_id, |_, members| members.is_empty());
        event!(Level::DEBUG, connection_id=%id, %list_id, "left room");
    }

    pub fn is_member(&self, id: ConnectionId, list_id: TodoListId) -> bool {
        self.rooms
            .get(&list_id)
            .map(|members| members.contains(&id))
            .unwrap_or(false)
    }

    #[cfg(test)]
    fn room_size(&self, list_id: TodoListId) -> usize {
        self.rooms.get(&list_id).map(|m| m.len()).unwrap_or(0)
    }

    #[cfg(test)]
    fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Send an event to every connection in the list's room, except `skip` if given. Returns
    /// the number of connections the event was queued for.
    pub fn broadcast(&self, list_id: TodoListId, event: ServerEvent, skip: Option<ConnectionId>) -> usize {
        let members: Vec<ConnectionId> = match self.rooms.get(&list_id) {
            Some(members) => members
                .iter()
                .filter(|id| Some(**id) != skip)
                .copied()
                .collect(),
            None => return 0,
        };

        let message = OutgoingMessage::from(event);
        let mut sent = 0;
        for id in members {
            let Some(sender) = self.connections.get(&id).map(|s| s.clone()) else {
                continue;
            };

            match sender.try_send(message.clone()) {
                Ok(()) => sent += 1,
                Err(TrySendError::Full(_)) => {
                    event!(Level::WARN, connection_id=%id, %list_id, "connection queue full, dropping event");
                }
                Err(TrySendError::Closed(_)) => {
                    event!(Level::DEBUG, connection_id=%id, "connection already closed");
                }
            }
        }

        event!(Level::DEBUG, %list_id, sent, "broadcast event");
        sent
    }

    /// Send an event to everyone viewing the list
    pub fn publish(&self, list_id: TodoListId, event: ServerEvent) -> usize {
        self.broadcast(list_id, event, None)
    }
}
