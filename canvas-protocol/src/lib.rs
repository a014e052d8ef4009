//! Wire message types shared between the server and any client: the tagged
//! `ClientMessage`/`ServerMessage` envelopes, the join acknowledgement, and
//! the public-facing user/room shapes. No transport code lives here.

pub mod message;

pub use message::{ClientMessage, JoinAck, RoomInfo, ServerMessage, UserPublic, WirePoint};
