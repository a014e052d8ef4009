//! Opaque identifier aliases. The dispatcher and log never parse these for
//! structure — only equality and use as map keys — per the "operation ids as
//! strings" design note.

use std::time::{SystemTime, UNIX_EPOCH};

pub type RoomId = String;
pub type UserId = String;
pub type OperationId = String;
pub type ConnectionId = String;

/// Milliseconds since the UNIX epoch, the single clock every server-stamped
/// timestamp in the system goes through.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
