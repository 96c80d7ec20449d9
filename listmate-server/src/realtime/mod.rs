//! Realtime todo events. Clients connect to `/ws`, join a room per list, and receive
//! `todoCreated` and `todoUpdated` events for that list.

mod connection;
pub mod hub;
pub mod messages;

use axum::routing;
pub use hub::RoomHub;
pub use messages::ServerEvent;

use crate::server::ServerState;

pub fn create_routes() -> axum::Router<ServerState> {
    axum::Router::new().route("/ws", routing::get(connection::ws_handler))
}
