//! A single room: its operation log plus the membership roster needed to
//! assign display colors and detect when the room is eligible for reaping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ids::{now_millis, ConnectionId, RoomId, UserId};
use crate::log::{ExportedLog, LogSnapshot, MergeOutcome, OperationLog};
use crate::operation::{Operation, Stroke};

/// Ten hand-picked colors handed out in order as users join; once exhausted,
/// `Room::next_color` falls back to a golden-angle hue rotation so every
/// later arrival still gets a color distinct from its immediate neighbors.
pub const PALETTE: [&str; 10] = [
    "#e6194b", "#3cb44b", "#ffe119", "#4363d8", "#f58231", "#911eb4", "#46f0f0", "#f032e6",
    "#bcf60c", "#fabebe",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub user_id: UserId,
    pub connection_id: ConnectionId,
    pub display_name: String,
    pub color: String,
    pub joined_at: u64,
}

pub struct Room {
    id: RoomId,
    log: OperationLog,
    sessions: BTreeMap<UserId, Session>,
    created_at: u64,
    last_active_at: u64,
    empty_since: Option<u64>,
    max_members: usize,
}

impl Room {
    pub fn new(id: RoomId, max_operations: usize, max_members: usize) -> Self {
        let now = now_millis();
        Self {
            log: OperationLog::new(id.clone(), max_operations),
            id,
            sessions: BTreeMap::new(),
            created_at: now,
            last_active_at: now,
            empty_since: Some(now),
            max_members,
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn last_active_at(&self) -> u64 {
        self.last_active_at
    }

    pub fn member_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Milliseconds since the room last had zero members, or `None` if it
    /// currently has members. Used by the reaper's empty-room grace check.
    pub fn empty_duration_millis(&self, now: u64) -> Option<u64> {
        self.empty_since.map(|since| now.saturating_sub(since))
    }

    pub fn idle_duration_millis(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_active_at)
    }

    fn touch(&mut self) {
        self.last_active_at = now_millis();
    }

    /// Bumps `last_active_at` without otherwise mutating the room. For
    /// member-originated events that don't touch the log or roster
    /// (in-progress draw batches, cursor moves) but still count as activity
    /// for the stale-room reaper.
    pub fn touch_activity(&mut self) {
        self.touch();
    }

    /// Picks the first palette entry not already assigned to a current
    /// member. Once every palette slot is taken, falls back to a
    /// golden-angle hue so colors keep spreading out rather than repeating.
    fn next_color(&self) -> String {
        let taken: std::collections::HashSet<&str> =
            self.sessions.values().map(|s| s.color.as_str()).collect();

        for candidate in PALETTE.iter() {
            if !taken.contains(candidate) {
                return candidate.to_string();
            }
        }

        let hue = (self.sessions.len() as u64 * 137) % 360;
        format!("hsl({hue}, 70%, 50%)")
    }

    /// Admits `user_id` with a freshly-assigned color, rejecting once the
    /// room is at `max_members`. Re-joining an already-seated user id
    /// replaces its session (new connection, same seat) rather than erroring.
    pub fn add_member(
        &mut self,
        user_id: UserId,
        connection_id: ConnectionId,
        display_name: String,
    ) -> Result<Session> {
        if !self.sessions.contains_key(&user_id) && self.sessions.len() >= self.max_members {
            return Err(Error::RoomFull);
        }

        let color = self.next_color();
        let session = Session {
            user_id: user_id.clone(),
            connection_id,
            display_name,
            color,
            joined_at: now_millis(),
        };
        self.sessions.insert(user_id, session.clone());
        self.empty_since = None;
        self.touch();
        Ok(session)
    }

    /// Removes a member, returning its session if present. Re-arms the
    /// empty-room grace timer the moment membership reaches zero.
    pub fn remove_member(&mut self, user_id: &str) -> Option<Session> {
        let removed = self.sessions.remove(user_id);
        if removed.is_some() {
            self.touch();
            if self.sessions.is_empty() {
                self.empty_since = Some(now_millis());
            }
        }
        removed
    }

    pub fn member(&self, user_id: &str) -> Option<&Session> {
        self.sessions.get(user_id)
    }

    pub fn members(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn member_snapshot(&self) -> Vec<Session> {
        self.sessions.values().cloned().collect()
    }

    pub fn append_stroke(&mut self, user_id: &str, stroke: Stroke) -> Operation {
        self.touch();
        self.log.append_stroke(user_id, stroke)
    }

    pub fn undo(&mut self, operation_id: &str, actor: &str) -> Result<Operation> {
        self.touch();
        self.log.undo(operation_id, actor)
    }

    pub fn redo(&mut self, operation_id: &str, actor: &str) -> Result<Operation> {
        self.touch();
        self.log.redo(operation_id, actor)
    }

    pub fn clear(&mut self, actor: &str) -> Operation {
        self.touch();
        self.log.clear(actor)
    }

    pub fn last_active_operation(&self) -> Option<Operation> {
        self.log.last_active()
    }

    pub fn last_undone_operation(&self) -> Option<Operation> {
        self.log.last_undone()
    }

    pub fn merge_operations(&mut self, external: Vec<Operation>) -> MergeOutcome {
        self.touch();
        self.log.merge(external)
    }

    pub fn log_snapshot(&self) -> LogSnapshot {
        self.log.snapshot()
    }

    pub fn export_log(&self) -> ExportedLog {
        self.log.export()
    }
}
