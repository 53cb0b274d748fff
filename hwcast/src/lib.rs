//! Library API for the hwcast viewer: push-channel types, client helpers and
//! text rendering. The binary is a thin loop over these.

pub mod render;
pub mod types;
pub mod ws;

pub use types::{ServerFrame, Update};
pub use ws::{connect, next_frame, parse_url, ping, request_status, ClientError, WsStream};
