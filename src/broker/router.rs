use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::broker::message::{IngressRecord, Message};
use crate::broker::partition::{PartitionTable, find_partition};
use crate::utils::error::{BrokerError, BrokerResult};

/// Where an accepted record was queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enqueued {
    pub id: u64,
    pub partition: usize,
}

/// Ingress side of the broker: hashes each record's topic and pushes it onto
/// the owning partition's bounded queue.
///
/// `route` waits while that queue is full, which is the broker's only form
/// of backpressure. Cloning a `Router` is cheap and every clone feeds the
/// same queues.
#[derive(Debug, Clone)]
pub struct Router {
    table: Arc<PartitionTable>,
    queues: Arc<[mpsc::Sender<Message>]>,
    next_id: Arc<AtomicU64>,
}

impl Router {
    pub fn new(table: Arc<PartitionTable>, queues: Vec<mpsc::Sender<Message>>) -> Self {
        Self {
            table,
            queues: queues.into(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub async fn route(&self, record: IngressRecord) -> BrokerResult<Enqueued> {
        if record.topic.trim().is_empty() {
            return Err(BrokerError::Malformed("topic must not be empty".to_string()));
        }

        let hash = self.table.hash(&record.topic);
        let Some(partition) = find_partition(self.table.boundaries(), hash) else {
            warn!(
                topic = %record.topic,
                hash,
                "Dropping message, topic hash is outside every partition"
            );
            return Err(BrokerError::UnroutableTopic {
                topic: record.topic,
                hash,
            });
        };
        let queue = self
            .queues
            .get(partition)
            .ok_or(BrokerError::QueueClosed { partition })?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let message = Message::from_record(id, record);
        info!(
            partition,
            id,
            "Message for topic: {}, from: {}, act: {} received",
            message.topic,
            message.sender,
            message.action
        );

        queue
            .send(message)
            .await
            .map_err(|_| BrokerError::QueueClosed { partition })?;

        Ok(Enqueued { id, partition })
    }
}
