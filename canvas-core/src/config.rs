//! Runtime configuration for the collaboration core.
//!
//! Mirrors the teacher's `NarayanaConfig`: a flat, serde-friendly struct with
//! sane defaults, an environment-variable loader, and a validation pass run
//! once at startup before anything is wired up.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tunables for room admission, log trimming, and lifecycle reaping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanvasConfig {
    /// HTTP/WebSocket bind port.
    pub port: u16,
    /// Hard cap on simultaneous members of one room.
    pub max_users_per_room: usize,
    /// Hard cap on operations retained per room; oldest entries are trimmed.
    pub max_operations: usize,
    /// Seconds an empty room survives before the grace-period check fires.
    pub empty_room_grace_secs: u64,
    /// Seconds of room inactivity while empty the periodic reaper treats as
    /// eligible for deletion.
    pub idle_room_reap_secs: u64,
    /// Seconds of room inactivity, regardless of membership, after which the
    /// periodic reaper deletes the room as a stale-session sweep.
    pub stale_room_reap_secs: u64,
    /// Interval between periodic reaper sweeps.
    pub reaper_interval_secs: u64,
    /// Capacity of each connection's outbound backpressure queue.
    pub outbound_queue_capacity: usize,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            max_users_per_room: 20,
            max_operations: 1000,
            empty_room_grace_secs: 60,
            idle_room_reap_secs: 5 * 60,
            stale_room_reap_secs: 60 * 60,
            reaper_interval_secs: 5 * 60,
            outbound_queue_capacity: 64,
        }
    }
}

impl CanvasConfig {
    /// Load configuration, applying environment overrides on top of defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = parse_env("CANVAS_PORT") {
            config.port = v;
        }
        if let Some(v) = parse_env("CANVAS_MAX_USERS_PER_ROOM") {
            config.max_users_per_room = v;
        }
        if let Some(v) = parse_env("CANVAS_MAX_OPERATIONS") {
            config.max_operations = v;
        }
        if let Some(v) = parse_env("CANVAS_EMPTY_ROOM_GRACE_SECS") {
            config.empty_room_grace_secs = v;
        }
        if let Some(v) = parse_env("CANVAS_IDLE_ROOM_REAP_SECS") {
            config.idle_room_reap_secs = v;
        }
        if let Some(v) = parse_env("CANVAS_STALE_ROOM_REAP_SECS") {
            config.stale_room_reap_secs = v;
        }
        if let Some(v) = parse_env("CANVAS_REAPER_INTERVAL_SECS") {
            config.reaper_interval_secs = v;
        }
        if let Some(v) = parse_env("CANVAS_OUTBOUND_QUEUE_CAPACITY") {
            config.outbound_queue_capacity = v;
        }

        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::Configuration("port cannot be 0".into()));
        }
        if self.max_users_per_room == 0 {
            return Err(Error::Configuration(
                "max_users_per_room must be > 0".into(),
            ));
        }
        if self.max_operations == 0 {
            return Err(Error::Configuration("max_operations must be > 0".into()));
        }
        if self.empty_room_grace_secs == 0 {
            return Err(Error::Configuration(
                "empty_room_grace_secs must be > 0".into(),
            ));
        }
        if self.reaper_interval_secs == 0 {
            return Err(Error::Configuration(
                "reaper_interval_secs must be > 0".into(),
            ));
        }
        if self.outbound_queue_capacity == 0 {
            return Err(Error::Configuration(
                "outbound_queue_capacity must be > 0".into(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
