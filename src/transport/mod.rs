//! The `transport` module accepts ingress traffic over WebSockets.
//!
//! Each text or binary frame carries one JSON record
//! `{"action", "topic", "sender", "body"}`. The server routes it and
//! replies with an acknowledgement saying whether it was enqueued or why it
//! was rejected.

pub mod message;
pub mod websocket;

pub use message::{RejectReason, ServerMessage};
pub use websocket::{handle_payload, serve, start_websocket_server};

#[cfg(test)]
mod tests;
