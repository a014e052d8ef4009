//! Periodic background sweep that deletes rooms past their idle/stale
//! windows and refreshes the manager gauges; a backstop for the per-leave
//! empty-room grace check in `websocket.rs`, which handles the common case
//! promptly. Grounded on the teacher's `startup.rs` periodic-task pattern
//! (`tokio::time::interval` loop spawned once at boot), generalized from
//! connection cleanup to room lifecycle.

use std::time::Duration;

use tracing::info;

use crate::state::AppState;

pub fn spawn(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(state.config.reaper_interval_secs));
        loop {
            ticker.tick().await;
            let reaped = state.room_manager.reap();
            for room_id in &reaped {
                info!(room_id = %room_id, "reaper removed room");
                state.metrics.record_room_reaped();
            }
            let stats = state.room_manager.stats();
            state.metrics.set_room_count(stats.room_count);
            state.metrics.set_session_count(stats.session_count);
        }
    });
}
