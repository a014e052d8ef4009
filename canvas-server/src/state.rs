//! Shared application state handed to every axum handler and every
//! `SessionDispatcher`.

use std::sync::Arc;

use canvas_core::{CanvasConfig, RoomManager};

use crate::connections::ConnectionRegistry;
use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub room_manager: Arc<RoomManager>,
    pub connections: Arc<ConnectionRegistry>,
    pub metrics: Arc<Metrics>,
    pub config: Arc<CanvasConfig>,
}

impl AppState {
    pub fn new(config: CanvasConfig, metrics: Metrics) -> Self {
        let config = Arc::new(config);
        Self {
            room_manager: Arc::new(RoomManager::new(&config)),
            connections: Arc::new(ConnectionRegistry::new()),
            metrics: Arc::new(metrics),
            config,
        }
    }
}
