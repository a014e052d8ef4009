//! WebSocket transport: upgrades the HTTP connection, then runs two tasks per
//! socket — one draining the connection's `OutboundQueue` to the wire, one
//! feeding inbound text frames to a `SessionDispatcher`. Grounded on the
//! teacher's `handle_socket` split-socket/select! shape, with the manager's
//! mpsc channel replaced by the backpressure queue and no token auth (the
//! spec carries no authentication surface).

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use canvas_core::RoomId;

use crate::backpressure::OutboundQueue;
use crate::dispatcher::SessionDispatcher;
use crate::state::AppState;

pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4().to_string();
    info!(connection_id = %connection_id, "websocket connection established");

    let queue = Arc::new(OutboundQueue::new(state.config.outbound_queue_capacity));
    state.connections.register(connection_id.clone(), queue.clone());

    let (mut sink, mut stream) = socket.split();

    let send_queue = queue.clone();
    let send_connection_id = connection_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(payload) = send_queue.recv().await {
            if let Err(e) = sink.send(Message::Text(payload)).await {
                warn!(connection_id = %send_connection_id, error = %e, "failed to write to socket");
                break;
            }
        }
    });

    let mut dispatcher = SessionDispatcher::new(
        connection_id.clone(),
        state.room_manager.clone(),
        state.connections.clone(),
        state.metrics.clone(),
    );
    let recv_loop = async {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    if let Err(e) = dispatcher.handle_text(&text) {
                        debug!(connection_id = %connection_id, error = %e, "dropped malformed frame");
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(connection_id = %connection_id, error = %e, "websocket read error");
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = &mut send_task => {}
        _ = recv_loop => {}
    }
    if let Some(room_id) = dispatcher.disconnect() {
        schedule_empty_room_grace_check(&state, room_id);
    }
    send_task.abort();

    queue.close();
    state.connections.unregister(&connection_id);
    info!(connection_id = %connection_id, "websocket connection closed");
}

/// After a leave empties a room, waits out the configured grace period and
/// then deletes the room if it's still empty. A join within the window
/// re-arms the room's `empty_since`, so `reap_room_if_empty` simply no-ops —
/// nothing here needs to track or cancel this task.
fn schedule_empty_room_grace_check(state: &AppState, room_id: RoomId) {
    let room_manager = state.room_manager.clone();
    let grace = Duration::from_secs(state.config.empty_room_grace_secs);
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        if room_manager.reap_room_if_empty(&room_id, grace.as_millis() as u64) {
            info!(room_id = %room_id, "deleted room after empty grace period");
        }
    });
}
