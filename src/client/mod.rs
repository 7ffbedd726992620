//! The `client` module is a small ingress client for the broker.
//!
//! It speaks the same WebSocket protocol as the `transport` server. The CLI
//! uses it to submit records, and so do the end-to-end tests.

pub mod pubsub_client;
pub use pubsub_client::{Client, ClientError};
