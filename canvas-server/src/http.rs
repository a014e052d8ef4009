//! HTTP surface: health/stats for dashboards, Prometheus exposition, and the
//! WebSocket upgrade route. Grounded on the teacher's `create_router`
//! (`public_routes` merged into one `Router`, `ApiState` as the extension
//! state), trimmed to the handful of side channels this spec actually needs
//! — no auth middleware, no rate limiting, since neither is in scope.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use canvas_core::ManagerStats;

use crate::state::AppState;
use crate::websocket::websocket_handler;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub stats: ManagerStats,
    pub timestamp: u64,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/metrics", get(metrics_handler))
        .route("/ws", get(websocket_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        stats: state.room_manager.stats(),
        timestamp: canvas_core::now_millis(),
    })
}

async fn stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.room_manager.stats())
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics.render()
}
