//! Process-wide directory of rooms.
//!
//! Lock granularity follows the teacher's connection registry: a top-level
//! `RwLock` guards the room directory itself (cheap, read-mostly — rooms are
//! created/destroyed far less often than they're mutated), while each room's
//! content lives behind its own `Mutex` so concurrent traffic in room A never
//! waits on room B.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::config::CanvasConfig;
use crate::ids::{now_millis, ConnectionId, RoomId};
use crate::names::generate_display_name;
use crate::room::{Room, Session};

#[derive(Debug, Clone, PartialEq)]
pub enum JoinOutcome {
    Joined(Session),
    RoomFull,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LeaveOutcome {
    Left(Session),
    RoomNotFound,
    NotAMember,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ManagerStats {
    pub room_count: usize,
    pub session_count: usize,
}

pub struct RoomManager {
    rooms: RwLock<HashMap<RoomId, Arc<Mutex<Room>>>>,
    max_operations: usize,
    max_users_per_room: usize,
    idle_room_reap_secs: u64,
    stale_room_reap_secs: u64,
    user_nonce: AtomicU64,
}

impl RoomManager {
    pub fn new(config: &CanvasConfig) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            max_operations: config.max_operations,
            max_users_per_room: config.max_users_per_room,
            idle_room_reap_secs: config.idle_room_reap_secs,
            stale_room_reap_secs: config.stale_room_reap_secs,
            user_nonce: AtomicU64::new(0),
        }
    }

    /// Gets the room, creating it on first use. The creation path takes the
    /// directory write lock only for the brief `entry().or_insert_with`; all
    /// subsequent work against the room happens after that lock is dropped.
    fn get_or_create(&self, room_id: &str) -> Arc<Mutex<Room>> {
        if let Some(room) = self.rooms.read().get(room_id) {
            return room.clone();
        }
        let mut rooms = self.rooms.write();
        rooms
            .entry(room_id.to_string())
            .or_insert_with(|| {
                debug!(room_id, "creating room");
                Arc::new(Mutex::new(Room::new(
                    room_id.to_string(),
                    self.max_operations,
                    self.max_users_per_room,
                )))
            })
            .clone()
    }

    fn mint_user_id(&self) -> String {
        let nonce = self.user_nonce.fetch_add(1, Ordering::Relaxed);
        format!("user_{}_{}", now_millis(), nonce)
    }

    /// Admits a new session into `room_id`, lazily creating the room. Mints
    /// the user id and, when `display_name` is absent, a whimsical one too —
    /// both are the manager's job per the join contract, not the caller's.
    pub fn join(
        &self,
        room_id: &str,
        connection_id: ConnectionId,
        display_name: Option<String>,
    ) -> JoinOutcome {
        let room = self.get_or_create(room_id);
        let user_id = self.mint_user_id();
        let display_name = display_name.unwrap_or_else(generate_display_name);

        let mut room = room.lock();
        match room.add_member(user_id, connection_id, display_name) {
            Ok(session) => JoinOutcome::Joined(session),
            Err(_) => {
                info!(room_id, "join rejected: room full");
                JoinOutcome::RoomFull
            }
        }
    }

    pub fn leave(&self, room_id: &str, user_id: &str) -> LeaveOutcome {
        let room = match self.rooms.read().get(room_id).cloned() {
            Some(room) => room,
            None => return LeaveOutcome::RoomNotFound,
        };
        let mut room = room.lock();
        match room.remove_member(user_id) {
            Some(session) => LeaveOutcome::Left(session),
            None => LeaveOutcome::NotAMember,
        }
    }

    /// Deletes `room_id` if, and only if, it is still empty and has been
    /// empty for at least `min_empty_ms`. Callers schedule this after the
    /// grace period following a `leave` that emptied a room; a rejoin inside
    /// the window re-arms `empty_since` (`Room::add_member`), so the check
    /// can simply no-op rather than needing the caller to cancel anything.
    /// Returns whether the room was actually removed.
    pub fn reap_room_if_empty(&self, room_id: &str, min_empty_ms: u64) -> bool {
        let now = now_millis();
        let should_remove = match self.rooms.read().get(room_id) {
            Some(room) => {
                let room = room.lock();
                room.is_empty()
                    && room.empty_duration_millis(now).map(|ms| ms >= min_empty_ms).unwrap_or(false)
            }
            None => false,
        };
        if should_remove {
            self.rooms.write().remove(room_id);
            info!(room_id, "reaped room after empty grace period");
        }
        should_remove
    }

    /// Runs `f` against the room's content under its own lock, without
    /// holding the directory lock. Returns `None` if the room doesn't exist
    /// (callers only reach this after a successful `join`, so this is an
    /// invariant violation worth logging, not a user-facing error).
    pub fn with_room<T>(&self, room_id: &str, f: impl FnOnce(&mut Room) -> T) -> Option<T> {
        let room = self.rooms.read().get(room_id).cloned()?;
        let mut room = room.lock();
        Some(f(&mut room))
    }

    pub fn stats(&self) -> ManagerStats {
        let rooms = self.rooms.read();
        let session_count = rooms.values().map(|r| r.lock().member_count()).sum();
        ManagerStats {
            room_count: rooms.len(),
            session_count,
        }
    }

    /// One sweep of the periodic reaper: a backstop for the leave-path's
    /// grace-period check (`reap_room_if_empty`), in case that scheduled
    /// check never ran (process restart during the grace window, a leave
    /// that raced a crash), this deletes any room that's been empty for at
    /// least `idle_room_reap_secs`; and, as a safety net for rooms stuck
    /// non-empty by connections that vanished without a `leave`, any room
    /// untouched for `stale_room_reap_secs` regardless of membership.
    /// Returns the ids removed, for logging by the caller.
    pub fn reap(&self) -> Vec<RoomId> {
        let now = now_millis();
        let idle_reap_ms = self.idle_room_reap_secs * 1000;
        let stale_reap_ms = self.stale_room_reap_secs * 1000;

        let doomed: Vec<RoomId> = {
            let rooms = self.rooms.read();
            rooms
                .iter()
                .filter_map(|(id, room)| {
                    let room = room.lock();
                    let reap = if room.is_empty() {
                        room.empty_duration_millis(now)
                            .map(|ms| ms >= idle_reap_ms)
                            .unwrap_or(false)
                    } else {
                        room.idle_duration_millis(now) >= stale_reap_ms
                    };
                    reap.then(|| id.clone())
                })
                .collect()
        };

        if !doomed.is_empty() {
            let mut rooms = self.rooms.write();
            for id in &doomed {
                rooms.remove(id);
                info!(room_id = %id, "reaped room");
            }
        }

        doomed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> RoomManager {
        let mut config = CanvasConfig::default();
        config.max_users_per_room = 2;
        config.empty_room_grace_secs = 1;
        config.idle_room_reap_secs = 1;
        config.stale_room_reap_secs = 1;
        RoomManager::new(&config)
    }

    fn join(manager: &RoomManager, room_id: &str, connection_id: &str, name: &str) -> Session {
        match manager.join(room_id, connection_id.to_string(), Some(name.to_string())) {
            JoinOutcome::Joined(session) => session,
            JoinOutcome::RoomFull => panic!("expected room to admit {name}"),
        }
    }

    #[test]
    fn join_creates_room_and_mints_a_user_id() {
        let manager = manager();
        let session = join(&manager, "room-1", "c1", "Alice");
        assert!(session.user_id.starts_with("user_"));
        assert_eq!(manager.stats().room_count, 1);
        assert_eq!(manager.stats().session_count, 1);
    }

    #[test]
    fn join_mints_distinct_ids_for_concurrent_joiners() {
        let manager = manager();
        let a = join(&manager, "room-1", "c1", "Alice");
        let b = join(&manager, "room-1", "c2", "Bob");
        assert_ne!(a.user_id, b.user_id);
    }

    #[test]
    fn join_rejects_past_capacity() {
        let manager = manager();
        join(&manager, "room-1", "c1", "Alice");
        join(&manager, "room-1", "c2", "Bob");
        let outcome = manager.join("room-1", "c3".into(), Some("Carol".into()));
        assert_eq!(outcome, JoinOutcome::RoomFull);
    }

    #[test]
    fn leave_unknown_room_is_reported_distinctly() {
        let manager = manager();
        assert_eq!(manager.leave("ghost", "alice"), LeaveOutcome::RoomNotFound);
    }

    #[test]
    fn leave_non_member_is_reported_distinctly() {
        let manager = manager();
        join(&manager, "room-1", "c1", "Alice");
        assert_eq!(manager.leave("room-1", "bob"), LeaveOutcome::NotAMember);
    }

    #[test]
    fn with_room_runs_against_live_room_state() {
        let manager = manager();
        join(&manager, "room-1", "c1", "Alice");
        let count = manager.with_room("room-1", |room| room.member_count());
        assert_eq!(count, Some(1));
        assert_eq!(manager.with_room("ghost", |room| room.member_count()), None);
    }

    #[test]
    fn reap_removes_empty_room_past_grace() {
        let manager = manager();
        let alice = join(&manager, "room-1", "c1", "Alice");
        manager.leave("room-1", &alice.user_id);
        std::thread::sleep(std::time::Duration::from_millis(1100));
        let reaped = manager.reap();
        assert_eq!(reaped, vec!["room-1".to_string()]);
        assert_eq!(manager.stats().room_count, 0);
    }

    #[test]
    fn reap_leaves_populated_rooms_within_stale_window() {
        let manager = manager();
        join(&manager, "room-1", "c1", "Alice");
        let reaped = manager.reap();
        assert!(reaped.is_empty());
    }

    #[test]
    fn reap_room_if_empty_is_a_noop_before_the_grace_window_elapses() {
        let manager = manager();
        let alice = join(&manager, "room-1", "c1", "Alice");
        manager.leave("room-1", &alice.user_id);
        assert!(!manager.reap_room_if_empty("room-1", 60_000));
        assert_eq!(manager.stats().room_count, 1);
    }

    #[test]
    fn reap_room_if_empty_removes_the_room_once_the_grace_window_elapses() {
        let manager = manager();
        let alice = join(&manager, "room-1", "c1", "Alice");
        manager.leave("room-1", &alice.user_id);
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(manager.reap_room_if_empty("room-1", 5));
        assert_eq!(manager.stats().room_count, 0);
    }

    #[test]
    fn reap_room_if_empty_no_ops_when_a_rejoin_revives_the_room() {
        let manager = manager();
        let alice = join(&manager, "room-1", "c1", "Alice");
        manager.leave("room-1", &alice.user_id);
        std::thread::sleep(std::time::Duration::from_millis(10));
        join(&manager, "room-1", "c2", "Bob");
        assert!(!manager.reap_room_if_empty("room-1", 5));
        assert_eq!(manager.stats().room_count, 1);
    }
}
