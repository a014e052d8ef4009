//! HTTP/WebSocket front door for the canvas collaboration service: wires
//! `canvas-core`'s domain engine to an axum transport.

pub mod backpressure;
pub mod connections;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod metrics;
pub mod reaper;
pub mod state;
pub mod websocket;

pub use state::AppState;
