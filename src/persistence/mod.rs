//! The `persistence` module archives processed messages to durable storage.
//!
//! Workers forward every message that reached a terminal status to a single
//! sink task. The sink buffers records and writes them in one batch once the
//! buffer reaches a configured threshold. A failed batch write is retried;
//! if it keeps failing the batch goes to a dead-letter area rather than
//! being discarded.
//!
//! The durable store sits behind the [`BatchStore`] trait. The default
//! implementation is an embedded `sled` database.

pub mod sink;
pub mod sled_store;

use serde::{Deserialize, Serialize};

use crate::broker::message::{Message, Status};
use crate::utils::error::PersistenceResult;

pub use sink::{FlushOutcome, PersistenceSink};
pub use sled_store::SledStore;

/// An archived message as written to the store.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: u64,
    pub action: String,
    pub timestamp: i64,
    pub body: String,
    pub topic: String,
    pub sender: String,
    pub status: Status,
}

impl From<&Message> for Record {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            action: message.action.to_string(),
            timestamp: message.timestamp,
            body: message.body.clone(),
            topic: message.topic.clone(),
            sender: message.sender.clone(),
            status: message.status,
        }
    }
}

/// Durable storage written to by the persistence sink, one batch at a time.
pub trait BatchStore: Send + Sync + 'static {
    fn insert_batch(&self, records: &[Record]) -> PersistenceResult<()>;

    /// Stores records whose batch could not be written normally.
    fn dead_letter(&self, records: &[Record]) -> PersistenceResult<()>;
}

#[cfg(test)]
mod tests;
