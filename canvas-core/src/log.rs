//! Append-only, tombstoned operation log for one room.
//!
//! Tombstones (flipping `state` rather than removing entries) make undo/redo
//! idempotent under concurrent duplicate messages, and let a causal resort
//! after `merge` rebuild a consistent total order without inventing inverse
//! operations — see DESIGN.md for why a stack-based undo doesn't survive
//! merge.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::clock::{sort_by_causal_order, VectorClock};
use crate::error::{Error, Result};
use crate::ids::{now_millis, OperationId, RoomId};
use crate::operation::{ClearData, Operation, OperationData, OperationState, Stroke};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSnapshot {
    pub operations: Vec<Operation>,
    pub vector_clock: VectorClock,
    pub created_at: u64,
}

/// Full round-trip representation, distinct from `LogSnapshot`: carries the
/// nonce counter so a re-imported log keeps minting non-colliding ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedLog {
    pub room_id: RoomId,
    pub operations: Vec<Operation>,
    pub vector_clock: VectorClock,
    pub created_at: u64,
    pub nonce_cursor: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub merged_count: usize,
    pub total_count: usize,
}

pub struct OperationLog {
    room_id: RoomId,
    operations: Vec<Operation>,
    clock: VectorClock,
    created_at: u64,
    max_operations: usize,
    nonce: AtomicU64,
}

impl OperationLog {
    pub fn new(room_id: RoomId, max_operations: usize) -> Self {
        Self {
            room_id,
            operations: Vec::new(),
            clock: VectorClock::new(),
            created_at: now_millis(),
            max_operations,
            nonce: AtomicU64::new(0),
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    fn next_id(&self, user_id: &str, timestamp: u64) -> OperationId {
        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        format!("{user_id}_{timestamp}_{nonce}")
    }

    /// Appends a stroke operation authored by `user_id`.
    pub fn append_stroke(&mut self, user_id: &str, stroke: Stroke) -> Operation {
        self.append(user_id, OperationData::Stroke(stroke))
    }

    fn append(&mut self, user_id: &str, data: OperationData) -> Operation {
        let timestamp = now_millis();
        let vector_clock = self.clock.increment(user_id);
        let id = self.next_id(user_id, timestamp);

        let operation = Operation {
            id,
            user_id: user_id.to_string(),
            data,
            state: OperationState::Active,
            vector_clock,
            timestamp,
            undone_by: None,
            undone_at: None,
            redone_by: None,
            redone_at: None,
        };

        self.operations.push(operation.clone());
        self.trim();
        operation
    }

    /// Flips an active operation to `undone`. Fails with `OperationNotFound`
    /// or `WrongState` (already undone); both are silent no-ops to the
    /// dispatcher, never surfaced to the client.
    pub fn undo(&mut self, operation_id: &str, actor: &str) -> Result<Operation> {
        let now = now_millis();
        let op = self.find_mut(operation_id)?;
        if op.is_undone() {
            return Err(Error::WrongState(operation_id.to_string()));
        }
        op.state = OperationState::Undone;
        op.undone_by = Some(actor.to_string());
        op.undone_at = Some(now);
        Ok(op.clone())
    }

    /// Flips an undone operation back to `active`. Symmetric to `undo`.
    pub fn redo(&mut self, operation_id: &str, actor: &str) -> Result<Operation> {
        let now = now_millis();
        let op = self.find_mut(operation_id)?;
        if op.is_active() {
            return Err(Error::WrongState(operation_id.to_string()));
        }
        op.state = OperationState::Active;
        op.redone_by = Some(actor.to_string());
        op.redone_at = Some(now);
        Ok(op.clone())
    }

    /// Appends a new `clear` operation, then flips every previously-active
    /// op to `undone`, attributed to `actor`. A later `redo` of the clear op
    /// does not restore those ops — the post-clear state is what the clear
    /// records as "cleared" (documented asymmetry, not a bug).
    pub fn clear(&mut self, actor: &str) -> Operation {
        let now = now_millis();
        let cleared_count = self
            .operations
            .iter()
            .filter(|op| op.is_active())
            .count();

        let clear_op = self.append(actor, OperationData::Clear(ClearData { cleared_count }));

        for op in self.operations.iter_mut() {
            if op.id == clear_op.id {
                continue;
            }
            if op.is_active() {
                op.state = OperationState::Undone;
                op.undone_by = Some(actor.to_string());
                op.undone_at = Some(now);
            }
        }

        clear_op
    }

    /// Newest active operation, scanning backward, regardless of author —
    /// the "global undo" resolution the spec requires preserving.
    pub fn last_active(&self) -> Option<Operation> {
        self.operations.iter().rev().find(|op| op.is_active()).cloned()
    }

    /// Newest undone operation, scanning backward, regardless of author.
    pub fn last_undone(&self) -> Option<Operation> {
        self.operations.iter().rev().find(|op| op.is_undone()).cloned()
    }

    /// Deduplicates incoming operations by id, merges their vector clocks
    /// into the room clock, and resorts the whole log by causal order.
    pub fn merge(&mut self, external: Vec<Operation>) -> MergeOutcome {
        let existing: HashSet<&str> = self.operations.iter().map(|op| op.id.as_str()).collect();
        let new_ops: Vec<Operation> = external
            .into_iter()
            .filter(|op| !existing.contains(op.id.as_str()))
            .collect();
        let merged_count = new_ops.len();

        for op in &new_ops {
            self.clock.merge(&op.vector_clock);
        }
        self.operations.extend(new_ops);

        sort_by_causal_order(
            &mut self.operations,
            |op| &op.vector_clock,
            |op| op.timestamp,
        );

        self.trim();

        MergeOutcome {
            merged_count,
            total_count: self.operations.len(),
        }
    }

    pub fn snapshot(&self) -> LogSnapshot {
        LogSnapshot {
            operations: self.operations.clone(),
            vector_clock: self.clock.clone(),
            created_at: self.created_at,
        }
    }

    pub fn export(&self) -> ExportedLog {
        ExportedLog {
            room_id: self.room_id.clone(),
            operations: self.operations.clone(),
            vector_clock: self.clock.clone(),
            created_at: self.created_at,
            nonce_cursor: self.nonce.load(Ordering::Relaxed),
        }
    }

    pub fn import(room_id: RoomId, exported: ExportedLog, max_operations: usize) -> Result<Self> {
        if exported.room_id != room_id {
            return Err(Error::RoomMismatch {
                imported: exported.room_id,
                target: room_id,
            });
        }
        Ok(Self {
            room_id,
            operations: exported.operations,
            clock: exported.vector_clock,
            created_at: exported.created_at,
            max_operations,
            nonce: AtomicU64::new(exported.nonce_cursor),
        })
    }

    fn find_mut(&mut self, operation_id: &str) -> Result<&mut Operation> {
        self.operations
            .iter_mut()
            .find(|op| op.id == operation_id)
            .ok_or_else(|| Error::OperationNotFound(operation_id.to_string()))
    }

    /// Drops oldest entries regardless of state once over the cap. A
    /// very-old undone op becomes unredoable once trimmed; this is a
    /// documented contract, not a defect (see spec.md §9 "Trim semantics").
    fn trim(&mut self) {
        if self.operations.len() > self.max_operations {
            let overflow = self.operations.len() - self.max_operations;
            self.operations.drain(0..overflow);
        }
    }
}
