//! The canvas data model: points, strokes, and the tombstoned operation
//! envelope that wraps them in the per-room log.

use serde::{Deserialize, Serialize};

use crate::clock::VectorClock;
use crate::ids::{OperationId, UserId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_pressure")]
    pub pressure: f64,
}

fn default_pressure() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Brush,
    Eraser,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stroke {
    pub points: Vec<Point>,
    pub color: String,
    pub width: u8,
    pub tool: Tool,
    #[serde(rename = "isComplete", default)]
    pub is_complete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClearData {
    /// Count of operations this clear flipped to `undone`, recorded for
    /// audit/replay purposes. Redoing a clear does not restore them — see
    /// the clear-then-redo asymmetry documented in DESIGN.md.
    pub cleared_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OperationData {
    Stroke(Stroke),
    Clear(ClearData),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationState {
    Active,
    Undone,
}

/// A durable record of a user-initiated canvas mutation. `state` is the only
/// field mutable after append; everything else is frozen at creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Operation {
    pub id: OperationId,
    pub user_id: UserId,
    pub data: OperationData,
    pub state: OperationState,
    pub vector_clock: VectorClock,
    pub timestamp: u64,
    pub undone_by: Option<UserId>,
    pub undone_at: Option<u64>,
    pub redone_by: Option<UserId>,
    pub redone_at: Option<u64>,
}

impl Operation {
    pub fn is_active(&self) -> bool {
        matches!(self.state, OperationState::Active)
    }

    pub fn is_undone(&self) -> bool {
        matches!(self.state, OperationState::Undone)
    }
}
