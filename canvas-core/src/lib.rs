//! Collaboration core: vector-clock causal ordering, the tombstoned
//! operation log, and room/session lifecycle management. No networking code
//! lives here — `canvas-server` is the only crate that knows a socket exists.

pub mod clock;
pub mod config;
pub mod error;
pub mod ids;
pub mod log;
pub mod manager;
pub mod names;
pub mod operation;
pub mod room;

pub use clock::{CausalOrder, VectorClock};
pub use config::CanvasConfig;
pub use error::{Error, Result};
pub use ids::{now_millis, ConnectionId, OperationId, RoomId, UserId};
pub use log::{ExportedLog, LogSnapshot, MergeOutcome, OperationLog};
pub use manager::{JoinOutcome, LeaveOutcome, ManagerStats, RoomManager};
pub use operation::{ClearData, Operation, OperationData, OperationState, Point, Stroke, Tool};
pub use room::{Room, Session, PALETTE};
