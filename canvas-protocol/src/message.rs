//! Wire messages exchanged over the per-connection WebSocket channel.
//!
//! Both directions share the teacher's tagged-envelope shape
//! (`#[serde(tag = "event")]`), just keyed on this domain's event names
//! instead of `subscribe`/`query`/`ping`. `rename_all = "snake_case"` maps
//! each variant directly onto its wire event name, so `DrawEnd` serializes
//! as `{"event":"draw_end", ...}` with no per-variant rename needed.

use canvas_core::{Operation, OperationId, RoomId, Stroke, Tool, UserId};
use serde::{Deserialize, Serialize};

/// A point in an in-progress (not yet logged) stroke. Distinct from
/// `canvas_core::Point`, which always carries a defaulted pressure: points
/// on the wire during `draw_batch`/`remote_draw_batch` may omit it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WirePoint {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
}

/// A member's public identity, the only part of a `Session` ever sent over
/// the wire — no connection handle, no internal timestamps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserPublic {
    pub id: UserId,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomInfo {
    pub id: RoomId,
    pub users: Vec<UserPublic>,
}

/// Events a client may send. Timestamps on every variant are the client's
/// own clock and are never trusted as an `Operation.timestamp` — the
/// dispatcher always stamps its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinRoom {
        room_id: RoomId,
        #[serde(default)]
        username: Option<String>,
    },
    DrawStart {
        x: f64,
        y: f64,
        color: String,
        width: u8,
        tool: Tool,
        timestamp: u64,
    },
    DrawBatch {
        points: Vec<WirePoint>,
        timestamp: u64,
    },
    DrawEnd {
        stroke: Stroke,
        timestamp: u64,
    },
    Undo {
        #[serde(default)]
        operation_id: Option<OperationId>,
        timestamp: u64,
    },
    Redo {
        #[serde(default)]
        operation_id: Option<OperationId>,
        timestamp: u64,
    },
    ClearCanvas {
        timestamp: u64,
    },
    CursorMove {
        x: f64,
        y: f64,
        timestamp: u64,
    },
}

/// Events the server emits. `Error` is always targeted at one connection;
/// everything else is either targeted (joiner-only) or fanned out per the
/// broadcast policy documented on `SessionDispatcher`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerMessage {
    UserJoined {
        user: UserPublic,
    },
    UserLeft {
        user_id: UserId,
    },
    UsersList {
        users: Vec<UserPublic>,
    },
    RemoteDrawBatch {
        user_id: UserId,
        points: Vec<WirePoint>,
        #[serde(skip_serializing_if = "Option::is_none")]
        color: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        width: Option<u8>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool: Option<Tool>,
        timestamp: u64,
    },
    RemoteDrawEnd {
        user_id: UserId,
        stroke: Stroke,
        operation_id: OperationId,
        timestamp: u64,
    },
    RemoteUndo {
        user_id: UserId,
        operation_id: OperationId,
        timestamp: u64,
    },
    RemoteRedo {
        user_id: UserId,
        operation_id: OperationId,
        timestamp: u64,
    },
    RemoteClear {
        user_id: UserId,
        timestamp: u64,
    },
    RemoteCursor {
        user_id: UserId,
        x: f64,
        y: f64,
        timestamp: u64,
    },
    SyncState {
        operations: Vec<Operation>,
        timestamp: u64,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ServerMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl ClientMessage {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Reply to `join_room`, sent once per connection before it is considered
/// fully joined. Modeled as one flexible struct rather than an enum so a
/// `{success:false, error}` body and a `{success:true, user_id, user, room}`
/// body share a single, obviously-total serialization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JoinAck {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserPublic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JoinAck {
    pub fn success(user_id: UserId, user: UserPublic, room: RoomInfo) -> Self {
        Self {
            success: true,
            user_id: Some(user_id),
            user: Some(user),
            room: Some(room),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            user_id: None,
            user: None,
            room: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas_core::{OperationData, OperationState, Point, VectorClock};

    fn sample_operation() -> Operation {
        Operation {
            id: "alice_1_0".to_string(),
            user_id: "alice".to_string(),
            data: OperationData::Stroke(Stroke {
                points: vec![Point { x: 1.0, y: 2.0, pressure: 1.0 }],
                color: "#fff".to_string(),
                width: 3,
                tool: Tool::Brush,
                is_complete: true,
            }),
            state: OperationState::Active,
            vector_clock: VectorClock::new(),
            timestamp: 1000,
            undone_by: None,
            undone_at: None,
            redone_by: None,
            redone_at: None,
        }
    }

    fn round_trip_client(msg: ClientMessage) {
        let json = serde_json::to_string(&msg).unwrap();
        let back: ClientMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(
            serde_json::to_string(&back).unwrap(),
            json,
            "round trip must be stable"
        );
    }

    fn round_trip_server(msg: ServerMessage) {
        let json = serde_json::to_string(&msg).unwrap();
        let back: ServerMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(serde_json::to_string(&back).unwrap(), json);
    }

    #[test]
    fn join_room_tags_as_snake_case_event_name() {
        let msg = ClientMessage::JoinRoom {
            room_id: "r1".to_string(),
            username: Some("Alice".to_string()),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"event\":\"join_room\""));
        round_trip_client(msg);
    }

    #[test]
    fn all_client_variants_round_trip() {
        round_trip_client(ClientMessage::DrawStart {
            x: 1.0,
            y: 2.0,
            color: "#000".into(),
            width: 2,
            tool: Tool::Brush,
            timestamp: 1,
        });
        round_trip_client(ClientMessage::DrawBatch {
            points: vec![WirePoint { x: 1.0, y: 2.0, pressure: Some(0.5) }],
            timestamp: 2,
        });
        round_trip_client(ClientMessage::DrawEnd {
            stroke: Stroke {
                points: vec![],
                color: "#000".into(),
                width: 2,
                tool: Tool::Eraser,
                is_complete: true,
            },
            timestamp: 3,
        });
        round_trip_client(ClientMessage::Undo { operation_id: None, timestamp: 4 });
        round_trip_client(ClientMessage::Redo {
            operation_id: Some("op1".into()),
            timestamp: 5,
        });
        round_trip_client(ClientMessage::ClearCanvas { timestamp: 6 });
        round_trip_client(ClientMessage::CursorMove { x: 1.0, y: 1.0, timestamp: 7 });
    }

    #[test]
    fn all_server_variants_round_trip() {
        let user = UserPublic { id: "alice".into(), name: "Alice".into(), color: "#e6194b".into() };
        round_trip_server(ServerMessage::UserJoined { user: user.clone() });
        round_trip_server(ServerMessage::UserLeft { user_id: "alice".into() });
        round_trip_server(ServerMessage::UsersList { users: vec![user] });
        round_trip_server(ServerMessage::RemoteDrawBatch {
            user_id: "alice".into(),
            points: vec![WirePoint { x: 1.0, y: 1.0, pressure: None }],
            color: Some("#000".into()),
            width: Some(2),
            tool: Some(Tool::Brush),
            timestamp: 8,
        });
        round_trip_server(ServerMessage::RemoteDrawEnd {
            user_id: "alice".into(),
            stroke: Stroke {
                points: vec![],
                color: "#000".into(),
                width: 2,
                tool: Tool::Brush,
                is_complete: true,
            },
            operation_id: "op1".into(),
            timestamp: 9,
        });
        round_trip_server(ServerMessage::RemoteUndo {
            user_id: "alice".into(),
            operation_id: "op1".into(),
            timestamp: 10,
        });
        round_trip_server(ServerMessage::RemoteRedo {
            user_id: "alice".into(),
            operation_id: "op1".into(),
            timestamp: 11,
        });
        round_trip_server(ServerMessage::RemoteClear { user_id: "alice".into(), timestamp: 12 });
        round_trip_server(ServerMessage::RemoteCursor {
            user_id: "alice".into(),
            x: 1.0,
            y: 1.0,
            timestamp: 13,
        });
        round_trip_server(ServerMessage::SyncState {
            operations: vec![sample_operation()],
            timestamp: 14,
        });
        round_trip_server(ServerMessage::error("room_full", "room is full"));
    }

    #[test]
    fn join_ack_omits_absent_fields() {
        let failure = JoinAck::failure("room_full");
        let json = serde_json::to_string(&failure).unwrap();
        assert!(!json.contains("user_id"));
        assert!(json.contains("\"error\":\"room_full\""));

        let success = JoinAck::success(
            "alice".into(),
            UserPublic { id: "alice".into(), name: "Alice".into(), color: "#e6194b".into() },
            RoomInfo { id: "r1".into(), users: vec![] },
        );
        let json = serde_json::to_string(&success).unwrap();
        assert!(!json.contains("\"error\""));
        assert!(json.contains("\"success\":true"));
    }
}
