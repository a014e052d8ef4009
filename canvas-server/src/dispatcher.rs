//! Per-connection event loop: translates wire messages into `Room`
//! mutations and fan-out broadcasts. Grounded on the teacher's
//! `handle_message` in `websocket.rs`, generalized from a channel
//! subscribe/query protocol to the canvas event surface.

use std::sync::Arc;

use tracing::{debug, error, info};

use canvas_core::{ConnectionId, OperationData, RoomId, RoomManager, Stroke, UserId};
use canvas_protocol::{ClientMessage, JoinAck, RoomInfo, ServerMessage, UserPublic, WirePoint};

use crate::backpressure::Priority;
use crate::connections::ConnectionRegistry;
use crate::error::{Result, ServerError};
use crate::metrics::Metrics;

fn to_user_public(session: &canvas_core::Session) -> UserPublic {
    UserPublic {
        id: session.user_id.clone(),
        name: session.display_name.clone(),
        color: session.color.clone(),
    }
}

pub struct SessionDispatcher {
    connection_id: ConnectionId,
    room_manager: Arc<RoomManager>,
    connections: Arc<ConnectionRegistry>,
    metrics: Arc<Metrics>,
    session: Option<(RoomId, UserId)>,
}

impl SessionDispatcher {
    pub fn new(
        connection_id: ConnectionId,
        room_manager: Arc<RoomManager>,
        connections: Arc<ConnectionRegistry>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            connection_id,
            room_manager,
            connections,
            metrics,
            session: None,
        }
    }

    /// Decodes and handles one inbound text frame. A decode failure is
    /// reported to the sender and returned to the caller for logging, but
    /// never tears down the connection — one malformed frame should not
    /// cost the whole session.
    pub fn handle_text(&mut self, raw: &str) -> Result<()> {
        let message = ClientMessage::from_json(raw).map_err(|e| {
            self.send_self(&ServerMessage::error("parse_error", "invalid message format"), true);
            ServerError::from(e)
        })?;
        self.handle(message);
        Ok(())
    }

    fn handle(&mut self, message: ClientMessage) {
        match message {
            ClientMessage::JoinRoom { room_id, username } => self.join_room(room_id, username),
            ClientMessage::DrawStart { x, y, color, width, tool, .. } => {
                self.draw_start(x, y, color, width, tool)
            }
            ClientMessage::DrawBatch { points, timestamp } => self.draw_batch(points, timestamp),
            ClientMessage::DrawEnd { stroke, .. } => self.draw_end(stroke),
            ClientMessage::Undo { operation_id, .. } => self.undo(operation_id),
            ClientMessage::Redo { operation_id, .. } => self.redo(operation_id),
            ClientMessage::ClearCanvas { .. } => self.clear_canvas(),
            ClientMessage::CursorMove { x, y, timestamp } => self.cursor_move(x, y, timestamp),
        }
    }

    fn join_room(&mut self, room_id: RoomId, username: Option<String>) {
        if self.session.is_some() {
            self.send_self(&JoinAck::failure("already_joined"), true);
            return;
        }

        match self.room_manager.join(&room_id, self.connection_id.clone(), username) {
            canvas_core::JoinOutcome::RoomFull => {
                self.send_self(&JoinAck::failure("room_full"), true);
            }
            canvas_core::JoinOutcome::Joined(session) => {
                let user_id = session.user_id.clone();
                self.session = Some((room_id.clone(), user_id.clone()));

                let members = self
                    .room_manager
                    .with_room(&room_id, |room| room.member_snapshot())
                    .unwrap_or_default();
                let roster: Vec<UserPublic> = members.iter().map(to_user_public).collect();

                self.send_self(
                    &JoinAck::success(
                        user_id.clone(),
                        to_user_public(&session),
                        RoomInfo { id: room_id.clone(), users: roster.clone() },
                    ),
                    true,
                );

                self.broadcast(
                    &room_id,
                    &ServerMessage::UserJoined { user: to_user_public(&session) },
                    Some(self.connection_id.as_str()),
                    Priority::Critical,
                );
                self.send_self(&ServerMessage::UsersList { users: roster }, true);

                let snapshot = self.room_manager.with_room(&room_id, |room| room.log_snapshot());
                if let Some(snapshot) = snapshot {
                    if !snapshot.operations.is_empty() {
                        self.send_self(
                            &ServerMessage::SyncState {
                                operations: snapshot.operations,
                                timestamp: canvas_core::now_millis(),
                            },
                            true,
                        );
                    }
                }

                info!(room_id = %room_id, user_id = %user_id, "joined room");
            }
        }
    }

    fn draw_start(&self, x: f64, y: f64, color: String, width: u8, tool: canvas_core::Tool) {
        let Some((room_id, user_id)) = self.current_session() else { return };
        self.room_manager.with_room(room_id, |room| room.touch_activity());
        self.broadcast(
            room_id,
            &ServerMessage::RemoteDrawBatch {
                user_id: user_id.clone(),
                points: vec![WirePoint { x, y, pressure: None }],
                color: Some(color),
                width: Some(width),
                tool: Some(tool),
                timestamp: canvas_core::now_millis(),
            },
            Some(&self.connection_id),
            Priority::BestEffort,
        );
    }

    fn draw_batch(&self, points: Vec<WirePoint>, timestamp: u64) {
        let Some((room_id, user_id)) = self.current_session() else { return };
        self.room_manager.with_room(room_id, |room| room.touch_activity());
        self.broadcast(
            room_id,
            &ServerMessage::RemoteDrawBatch {
                user_id: user_id.clone(),
                points,
                color: None,
                width: None,
                tool: None,
                timestamp,
            },
            Some(&self.connection_id),
            Priority::BestEffort,
        );
    }

    fn draw_end(&self, stroke: Stroke) {
        let Some((room_id, user_id)) = self.current_session().map(|(r, u)| (r.clone(), u.clone())) else {
            return;
        };
        let operation = self
            .room_manager
            .with_room(&room_id, |room| room.append_stroke(&user_id, stroke.clone()));
        let Some(operation) = operation else { return };
        self.metrics.record_operation_appended();

        self.broadcast(
            &room_id,
            &ServerMessage::RemoteDrawEnd {
                user_id,
                stroke,
                operation_id: operation.id,
                timestamp: operation.timestamp,
            },
            Some(&self.connection_id),
            Priority::Critical,
        );
    }

    fn undo(&self, operation_id: Option<String>) {
        let Some((room_id, user_id)) = self.current_session().map(|(r, u)| (r.clone(), u.clone())) else {
            return;
        };
        let target = operation_id.or_else(|| {
            self.room_manager
                .with_room(&room_id, |room| room.last_active_operation())
                .flatten()
                .map(|op| op.id)
        });
        let Some(operation_id) = target else { return };

        let result = self
            .room_manager
            .with_room(&room_id, |room| room.undo(&operation_id, &user_id));
        match result {
            Some(Ok(operation)) => {
                self.broadcast(
                    &room_id,
                    &ServerMessage::RemoteUndo {
                        user_id,
                        operation_id: operation.id,
                        timestamp: operation.undone_at.unwrap_or(operation.timestamp),
                    },
                    None,
                    Priority::Critical,
                );
            }
            Some(Err(e)) => {
                debug!(room_id = %room_id, operation_id = %operation_id, error = %e, "undo was a no-op");
            }
            None => {}
        }
    }

    fn redo(&self, operation_id: Option<String>) {
        let Some((room_id, user_id)) = self.current_session().map(|(r, u)| (r.clone(), u.clone())) else {
            return;
        };
        let target = operation_id.or_else(|| {
            self.room_manager
                .with_room(&room_id, |room| room.last_undone_operation())
                .flatten()
                .map(|op| op.id)
        });
        let Some(operation_id) = target else { return };

        let result = self
            .room_manager
            .with_room(&room_id, |room| room.redo(&operation_id, &user_id));
        match result {
            Some(Ok(operation)) => {
                self.broadcast(
                    &room_id,
                    &ServerMessage::RemoteRedo {
                        user_id,
                        operation_id: operation.id,
                        timestamp: operation.redone_at.unwrap_or(operation.timestamp),
                    },
                    None,
                    Priority::Critical,
                );
            }
            Some(Err(e)) => {
                debug!(room_id = %room_id, operation_id = %operation_id, error = %e, "redo was a no-op");
            }
            None => {}
        }
    }

    fn clear_canvas(&self) {
        let Some((room_id, user_id)) = self.current_session().map(|(r, u)| (r.clone(), u.clone())) else {
            return;
        };
        let operation = self.room_manager.with_room(&room_id, |room| room.clear(&user_id));
        let Some(operation) = operation else { return };
        self.metrics.record_operation_appended();

        self.broadcast(
            &room_id,
            &ServerMessage::RemoteClear { user_id, timestamp: operation.timestamp },
            None,
            Priority::Critical,
        );
        debug_assert!(matches!(operation.data, OperationData::Clear(_)));
    }

    fn cursor_move(&self, x: f64, y: f64, timestamp: u64) {
        let Some((room_id, user_id)) = self.current_session() else { return };
        self.room_manager.with_room(room_id, |room| room.touch_activity());
        self.broadcast(
            room_id,
            &ServerMessage::RemoteCursor { user_id: user_id.clone(), x, y, timestamp },
            Some(&self.connection_id),
            Priority::BestEffort,
        );
    }

    /// Leaves the current room and notifies the remaining members. Safe to
    /// call on a connection that never joined — it is then a no-op, matching
    /// the "unknown session" resource-error policy. Returns the room id when
    /// this leave emptied it, so the caller can schedule the empty-room
    /// grace-period check.
    pub fn disconnect(&mut self) -> Option<RoomId> {
        let Some((room_id, user_id)) = self.session.take() else { return None };
        if let canvas_core::LeaveOutcome::Left(_) = self.room_manager.leave(&room_id, &user_id) {
            self.broadcast(&room_id, &ServerMessage::UserLeft { user_id: user_id.clone() }, None, Priority::Critical);
            let roster: Vec<UserPublic> = self
                .room_manager
                .with_room(&room_id, |room| room.member_snapshot())
                .unwrap_or_default()
                .iter()
                .map(to_user_public)
                .collect();
            let now_empty = roster.is_empty();
            self.broadcast(&room_id, &ServerMessage::UsersList { users: roster }, None, Priority::Critical);
            info!(room_id = %room_id, user_id = %user_id, "left room");
            return now_empty.then_some(room_id);
        }
        None
    }

    fn current_session(&self) -> Option<(&RoomId, &UserId)> {
        self.session.as_ref().map(|(room, user)| (room, user))
    }

    fn send_self(&self, message: &impl serde::Serialize, critical: bool) {
        self.send_to(&self.connection_id, message, critical);
    }

    fn send_to(&self, connection_id: &str, message: &impl serde::Serialize, critical: bool) {
        let Some(queue) = self.connections.get(connection_id) else { return };
        match serde_json::to_string(message) {
            Ok(json) => {
                let priority = if critical { Priority::Critical } else { Priority::BestEffort };
                if queue.push(json, priority) {
                    self.metrics.record_broadcast_dropped();
                }
            }
            Err(e) => error!(connection_id, error = %e, "failed to serialize outbound message"),
        }
    }

    /// Fans `message` out to every member of `room_id` except `exclude`,
    /// snapshotting membership under the room lock and releasing it before
    /// touching any connection's queue — a slow peer's full queue never
    /// blocks this call.
    fn broadcast(&self, room_id: &str, message: &ServerMessage, exclude: Option<&str>, priority: Priority) {
        let members = self
            .room_manager
            .with_room(room_id, |room| room.member_snapshot())
            .unwrap_or_default();

        let json = match serde_json::to_string(message) {
            Ok(json) => json,
            Err(e) => {
                error!(room_id, error = %e, "failed to serialize broadcast message");
                return;
            }
        };

        for member in members {
            if exclude == Some(member.connection_id.as_str()) {
                continue;
            }
            if let Some(queue) = self.connections.get(&member.connection_id) {
                if queue.push(json.clone(), priority) {
                    self.metrics.record_broadcast_dropped();
                }
                self.metrics.record_broadcast_sent();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas_core::CanvasConfig;
    use std::time::Duration;

    fn harness(max_users_per_room: usize) -> (Arc<RoomManager>, Arc<ConnectionRegistry>, Arc<Metrics>) {
        let config = CanvasConfig { max_users_per_room, ..CanvasConfig::default() };
        (
            Arc::new(RoomManager::new(&config)),
            Arc::new(ConnectionRegistry::new()),
            Arc::new(Metrics::install()),
        )
    }

    fn connect(connections: &Arc<ConnectionRegistry>, connection_id: &str) -> Arc<crate::backpressure::OutboundQueue> {
        let queue = Arc::new(crate::backpressure::OutboundQueue::new(64));
        connections.register(connection_id.to_string(), queue.clone());
        queue
    }

    async fn next(queue: &crate::backpressure::OutboundQueue) -> serde_json::Value {
        tokio::time::timeout(Duration::from_millis(200), queue.recv())
            .await
            .expect("message expected before timeout")
            .map(|json| serde_json::from_str(&json).unwrap())
            .expect("queue closed before a message arrived")
    }

    fn send(dispatcher: &mut SessionDispatcher, msg: &ClientMessage) {
        let json = serde_json::to_string(msg).unwrap();
        dispatcher.handle_text(&json).unwrap();
    }

    #[tokio::test]
    async fn two_user_converge_on_undo() {
        let (room_manager, connections, metrics) = harness(20);
        let queue_a = connect(&connections, "ca");
        let queue_b = connect(&connections, "cb");
        let mut a = SessionDispatcher::new("ca".into(), room_manager.clone(), connections.clone(), metrics.clone());
        let mut b = SessionDispatcher::new("cb".into(), room_manager.clone(), connections.clone(), metrics.clone());

        send(&mut a, &ClientMessage::JoinRoom { room_id: "r1".into(), username: Some("A".into()) });
        let ack_a = next(&queue_a).await;
        assert_eq!(ack_a["success"], true);

        send(&mut a, &ClientMessage::DrawEnd {
            stroke: sample_stroke(),
            timestamp: 0,
        });

        send(&mut b, &ClientMessage::JoinRoom { room_id: "r1".into(), username: Some("B".into()) });
        let _ack_b = next(&queue_b).await;
        let user_joined = next(&queue_a).await;
        assert_eq!(user_joined["event"], "user_joined");
        let _users_list_b = next(&queue_b).await;
        let sync_state = next(&queue_b).await;
        assert_eq!(sync_state["event"], "sync_state");
        let op1_id = sync_state["operations"][0]["id"].as_str().unwrap().to_string();

        send(&mut b, &ClientMessage::DrawEnd { stroke: sample_stroke(), timestamp: 0 });
        let remote_draw_end = next(&queue_a).await;
        assert_eq!(remote_draw_end["event"], "remote_draw_end");
        let op2_id = remote_draw_end["operation_id"].as_str().unwrap().to_string();
        assert_ne!(op1_id, op2_id);

        send(&mut a, &ClientMessage::Undo { operation_id: None, timestamp: 0 });
        let undo_a = next(&queue_a).await;
        let undo_b = next(&queue_b).await;
        assert_eq!(undo_a["event"], "remote_undo");
        assert_eq!(undo_a["operation_id"], op2_id, "lastActive is the newest active op");
        assert_eq!(undo_a["operation_id"], undo_b["operation_id"]);

        send(&mut a, &ClientMessage::Undo { operation_id: None, timestamp: 0 });
        let undo_a2 = next(&queue_a).await;
        assert_eq!(undo_a2["operation_id"], op1_id);
    }

    #[tokio::test]
    async fn room_full_rejection_sends_failure_ack_and_no_user_joined() {
        let (room_manager, connections, metrics) = harness(1);
        let queue_a = connect(&connections, "ca");
        let queue_b = connect(&connections, "cb");
        let mut a = SessionDispatcher::new("ca".into(), room_manager.clone(), connections.clone(), metrics.clone());
        let mut b = SessionDispatcher::new("cb".into(), room_manager.clone(), connections.clone(), metrics.clone());

        send(&mut a, &ClientMessage::JoinRoom { room_id: "r2".into(), username: Some("A".into()) });
        let _ack_a = next(&queue_a).await;

        send(&mut b, &ClientMessage::JoinRoom { room_id: "r2".into(), username: Some("B".into()) });
        let ack_b = next(&queue_b).await;
        assert_eq!(ack_b["success"], false);
        assert_eq!(ack_b["error"], "room_full");

        let no_user_joined = tokio::time::timeout(Duration::from_millis(50), queue_a.recv()).await;
        assert!(no_user_joined.is_err(), "room-full rejection must not broadcast user_joined");
    }

    fn sample_stroke() -> Stroke {
        Stroke {
            points: vec![canvas_core::Point { x: 0.0, y: 0.0, pressure: 1.0 }],
            color: "#000000".to_string(),
            width: 2,
            tool: canvas_core::Tool::Brush,
            is_complete: true,
        }
    }
}
