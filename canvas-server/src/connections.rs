//! Process-wide directory of live connections, grounded on the teacher's
//! `WebSocketManager` connection map but trimmed to what broadcast fan-out
//! actually needs: a connection id to its outbound queue. Room membership
//! (which connections belong to which room) stays in `canvas_core::Room` —
//! this registry is purely the socket-facing half.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use canvas_core::ConnectionId;

use crate::backpressure::OutboundQueue;

#[derive(Default)]
pub struct ConnectionRegistry {
    queues: RwLock<HashMap<ConnectionId, Arc<OutboundQueue>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, connection_id: ConnectionId, queue: Arc<OutboundQueue>) {
        self.queues.write().insert(connection_id, queue);
    }

    pub fn unregister(&self, connection_id: &str) -> Option<Arc<OutboundQueue>> {
        self.queues.write().remove(connection_id)
    }

    pub fn get(&self, connection_id: &str) -> Option<Arc<OutboundQueue>> {
        self.queues.read().get(connection_id).cloned()
    }

    pub fn connection_count(&self) -> usize {
        self.queues.read().len()
    }
}
