//! The `error` module defines the error types used within `shardsub`.
//!
//! Nothing raised while processing a message is fatal to the process. These
//! types exist so each layer can report *why* a message was rejected, failed
//! or lost, and so the binary can report startup failures.

use thiserror::Error;

/// Result type for routing and broker lifecycle operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Result type for outbound deliveries.
pub type DeliveryResult<T> = Result<T, DeliveryError>;

/// Result type for the durable store.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Errors surfaced at ingress or while wiring the broker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The ingress payload could not be decoded into a record.
    #[error("malformed input: {0}")]
    Malformed(String),

    /// The topic hashed outside every partition boundary.
    #[error("topic '{topic}' hashed to {hash}, outside every partition")]
    UnroutableTopic { topic: String, hash: u64 },

    /// Subscribe/Unsubscribe/Publish against a topic that was never created.
    #[error("cannot {action} on topic '{topic}': topic does not exist")]
    InvalidOperation { action: String, topic: String },

    /// The owning partition's queue no longer accepts messages.
    #[error("partition {partition} queue is closed")]
    QueueClosed { partition: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Reasons a single delivery attempt to a subscriber failed.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("transport error: {0}")]
    Transport(String),

    /// The subscriber answered, but not with an acceptance status.
    #[error("subscriber rejected delivery with status {status}")]
    Rejected { status: u16 },

    #[error("delivery timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        DeliveryError::Transport(err.to_string())
    }
}

/// Errors raised by the durable store behind the persistence sink.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("failed to open store at '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: sled::Error,
    },

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("batch write failed: {0}")]
    Write(String),
}

impl From<sled::Error> for PersistenceError {
    fn from(err: sled::Error) -> Self {
        PersistenceError::Write(err.to_string())
    }
}
