use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tracing::{event, instrument, Level};
use uuid::Uuid;

use super::{
    hub::ConnectionId,
    messages::{relayed_list_id, ClientMessage, OutgoingMessage, ServerEvent, PING_MESSAGE},
};
use crate::{
    auth::{permissions, Authed},
    server::ServerState,
};

const QUEUE_SIZE: usize = 100;

/// Upgrade the request to a WebSocket. Only logged-in users may connect.
#[instrument(skip(ws, state, auth), fields(user_id=%auth.user_id))]
pub async fn ws_handler(
    auth: Authed,
    State(state): State<ServerState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket_connection(socket, state, auth))
}

#[instrument(skip_all, fields(user_id=%auth.user_id, connection_id = tracing::field::Empty))]
async fn handle_websocket_connection(socket: WebSocket, state: ServerState, auth: Authed) {
    let (sink, stream) = socket.split();
    let (sender, receiver) = mpsc::channel::<OutgoingMessage>(QUEUE_SIZE);
    let connection_id = Uuid::new_v4();
    tracing::Span::current().record("connection_id", tracing::field::display(connection_id));

    state.realtime.add_connection(connection_id, sender.clone());
    event!(Level::INFO, "websocket connected");

    let sender_task = tokio::spawn(forwarder(sink, receiver));
    let connection = Connection {
        state: &state,
        auth: &auth,
        id: connection_id,
        sender,
    };

    tokio::select! {
        res = sender_task => {
            if let Err(e) = res {
                event!(Level::ERROR, error=%e, "sender task failed");
            }
        }
        _ = connection.read_messages(stream) => {
            event!(Level::DEBUG, "receiver finished");
        }
    }

    state.realtime.remove_connection(connection_id);
    event!(Level::INFO, "websocket disconnected");
}

/// Forwards messages from a [Receiver] to the socket, since the sink can't be cloned.
async fn forwarder(mut sink: SplitSink<WebSocket, Message>, mut receiver: Receiver<OutgoingMessage>) {
    while let Some(message) = receiver.recv().await {
        let msg = match Message::try_from(message) {
            Ok(msg) => msg,
            Err(e) => {
                event!(Level::ERROR, error=%e, "Failed to serialize message");
                continue;
            }
        };

        if let Err(e) = sink.send(msg).await {
            event!(Level::DEBUG, error=%e, "Failed to send message, client likely disconnected");
            break;
        }
    }
}

struct Connection<'a> {
    state: &'a ServerState,
    auth: &'a Authed,
    id: ConnectionId,
    sender: Sender<OutgoingMessage>,
}

impl<'a> Connection<'a> {
    async fn read_messages(&self, mut stream: SplitStream<WebSocket>) {
        while let Some(msg) = stream.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    event!(Level::DEBUG, error=%e, "websocket closed with error");
                    break;
                }
            };

            let text = match msg {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            if !self.handle_text(&text).await {
                break;
            }
        }
    }

    async fn send(&self, message: impl Into<OutgoingMessage>) -> bool {
        self.sender.send(message.into()).await.is_ok()
    }

    /// Handle a single text message. Returns false if the connection should be closed.
    async fn handle_text(&self, text: &str) -> bool {
        if text.trim() == PING_MESSAGE {
            return self.send(OutgoingMessage::Pong).await;
        }

        let message = match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                event!(Level::DEBUG, error=%e, "unparseable message");
                return self.send(ServerEvent::error("Invalid message")).await;
            }
        };

        match message {
            ClientMessage::JoinList { list_id } => {
                let allowed =
                    permissions::has_list_access(&self.state.db, self.auth.user_id, list_id).await;
                match allowed {
                    Ok(true) => {
                        self.state.realtime.join(self.id, list_id);
                        true
                    }
                    Ok(false) => {
                        self.send(ServerEvent::error("No permission to access this list"))
                            .await
                    }
                    Err(e) => {
                        event!(Level::ERROR, error=?e, %list_id, "checking list access");
                        self.send(ServerEvent::error("Server error")).await
                    }
                }
            }
            ClientMessage::LeaveList { list_id } => {
                self.state.realtime.leave(self.id, list_id);
                true
            }
            ClientMessage::TodoCreated { data } => {
                self.relay(data, |data| ServerEvent::TodoCreated { data }).await
            }
            ClientMessage::TodoUpdated { data } => {
                self.relay(data, |data| ServerEvent::TodoUpdated { data }).await
            }
        }
    }

    /// Pass a client's todo event on to the rest of the room. Only members of the room may
    /// relay to it.
    async fn relay(
        &self,
        data: serde_json::Value,
        make_event: impl FnOnce(serde_json::Value) -> ServerEvent,
    ) -> bool {
        let Some(list_id) = relayed_list_id(&data) else {
            return self.send(ServerEvent::error("Missing list_id")).await;
        };

        if !self.state.realtime.is_member(self.id, list_id) {
            event!(Level::DEBUG, %list_id, "relay from connection outside the room");
            return self.send(ServerEvent::error("Join the list before sending updates")).await;
        }

        self.state
            .realtime
            .broadcast(list_id, make_event(data), Some(self.id));
        true
    }
}
