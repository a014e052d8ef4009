//! Transport-level failures, kept separate from `canvas_core::Error` — those
//! are domain rejections (room full, bad state); these are "the pipe broke."

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to decode client message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to send to connection {connection_id}: {reason}")]
    Send { connection_id: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ServerError>;
