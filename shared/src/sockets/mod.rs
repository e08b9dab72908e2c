//! WebSocket push of department complaint changes.

pub mod broadcast;
pub mod connections;
pub mod handler;
pub mod messages;

pub use handler::{handle_websocket_event, is_websocket_event};
