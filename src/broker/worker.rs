//! Partition worker
//!
//! Exactly one worker runs per partition and it is the only task that ever
//! touches that partition's [`TopicTable`]. Everything else talks to it by
//! sending messages into its inbound queue, which the worker consumes in
//! arrival order. No lock guards the topic table because it is never shared.
//!
//! Publish deliveries happen inline and block only this partition. Each one
//! is bounded by the delivery timeout. A failed delivery goes to the
//! partition's [`RetryScheduler`] and the loop moves on at once.
//!
//! On shutdown the worker cancels outstanding retries, closes its queue and
//! drains whatever was already buffered. Cancelled retries and failures seen
//! while draining are archived as Failed instead of being retried.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::broker::delivery::Deliver;
use crate::broker::message::{Action, Message, Status};
use crate::broker::retry::{RetryScheduler, Scheduled};
use crate::broker::topic::TopicTable;
use crate::persistence::Record;
use crate::utils::error::{BrokerError, DeliveryError};

/// Counters reported by a worker when it stops.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    pub partition: usize,
    pub processed: u64,
    pub retries_cancelled: usize,
    pub drained: usize,
}

pub struct Worker<D: Deliver> {
    partition: usize,
    topics: TopicTable,
    inbox: mpsc::Receiver<Message>,
    deliverer: Arc<D>,
    delivery_timeout: Duration,
    retries: RetryScheduler,
    sink: Option<mpsc::Sender<Record>>,
    shutdown: watch::Receiver<bool>,
    processed: u64,
}

impl<D: Deliver> Worker<D> {
    pub fn new(
        partition: usize,
        inbox: mpsc::Receiver<Message>,
        deliverer: Arc<D>,
        delivery_timeout: Duration,
        retries: RetryScheduler,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            partition,
            topics: TopicTable::new(),
            inbox,
            deliverer,
            delivery_timeout,
            retries,
            sink: None,
            shutdown,
            processed: 0,
        }
    }

    /// Forward terminal messages to the persistence sink.
    pub fn with_sink(mut self, sink: Option<mpsc::Sender<Record>>) -> Self {
        self.sink = sink;
        self
    }

    pub fn topics(&self) -> &TopicTable {
        &self.topics
    }

    /// Applies `message` to the topic table and sets its status.
    ///
    /// A failed delivery also bumps `retry_count`. Unknown actions leave the
    /// message `Pending`.
    pub async fn process(&mut self, message: &mut Message) -> Status {
        let status = match &message.action {
            Action::CreateTopic => {
                if self.topics.create(&message.topic) {
                    info!(partition = self.partition, "Created topic: {}", message.topic);
                }
                Status::Success
            }
            Action::Subscribe => {
                if self.topics.subscribe(&message.topic, &message.sender) {
                    debug!(
                        partition = self.partition,
                        "{} subscribed to {}", message.sender, message.topic
                    );
                    Status::Success
                } else {
                    log_invalid(self.partition, message);
                    Status::Invalid
                }
            }
            Action::Unsubscribe => {
                if self.topics.unsubscribe(&message.topic, &message.sender) {
                    debug!(
                        partition = self.partition,
                        "{} unsubscribed from {}", message.sender, message.topic
                    );
                    Status::Success
                } else {
                    log_invalid(self.partition, message);
                    Status::Invalid
                }
            }
            Action::Publish => {
                publish(
                    self.partition,
                    &self.topics,
                    self.deliverer.as_ref(),
                    self.delivery_timeout,
                    message,
                )
                .await
            }
            Action::Unknown(name) => {
                warn!(
                    partition = self.partition,
                    id = message.id,
                    "Invalid action '{}' specified in message, dropping it",
                    name
                );
                return Status::Pending;
            }
        };

        message.status = status;
        if status == Status::Failed {
            message.retry_count += 1;
        }
        status
    }

    /// Processes one message and routes the result: retry, archive or drop.
    async fn handle(&mut self, mut message: Message, draining: bool) {
        self.processed += 1;
        match self.process(&mut message).await {
            Status::Pending => {}
            Status::Failed if !draining => match self.retries.schedule(message) {
                Scheduled::Retry { .. } => {}
                Scheduled::Exhausted(message) => self.archive(message).await,
            },
            _ => self.archive(message).await,
        }
    }

    async fn archive(&mut self, message: Message) {
        let Some(sink) = self.sink.as_ref() else {
            return;
        };
        if sink.send(Record::from(&message)).await.is_err() {
            warn!(
                partition = self.partition,
                id = message.id,
                "Persistence sink is closed, record not archived"
            );
        }
    }

    /// Runs until the shutdown signal fires, then drains the queue.
    pub async fn run(mut self) -> WorkerReport {
        info!(partition = self.partition, "Worker started");

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                received = self.inbox.recv() => match received {
                    Some(message) => {
                        self.handle(message, false).await;
                        self.retries.reap();
                    }
                    None => break,
                },
                Some(result) = self.retries.join_next(), if self.retries.outstanding() > 0 => {
                    if let Err(e) = result {
                        warn!(partition = self.partition, "Retry task failed: {e}");
                    }
                }
            }
        }

        let cancelled = self.retries.cancel_all().await;
        let retries_cancelled = cancelled.len();
        for mut message in cancelled {
            message.status = Status::Failed;
            self.archive(message).await;
        }
        self.inbox.close();

        let mut drained = 0;
        while let Some(message) = self.inbox.recv().await {
            drained += 1;
            self.handle(message, true).await;
        }

        info!(
            partition = self.partition,
            processed = self.processed,
            retries_cancelled,
            drained,
            "Worker stopped"
        );

        WorkerReport {
            partition: self.partition,
            processed: self.processed,
            retries_cancelled,
            drained,
        }
    }
}

async fn publish<D: Deliver>(
    partition: usize,
    topics: &TopicTable,
    deliverer: &D,
    delivery_timeout: Duration,
    message: &Message,
) -> Status {
    let Some(topic) = topics.get(&message.topic) else {
        log_invalid(partition, message);
        return Status::Invalid;
    };

    let Some(subscriber) = topic.pick_subscriber() else {
        debug!(
            partition,
            id = message.id,
            "No subscribers on topic {}, nothing to deliver",
            message.topic
        );
        return Status::Success;
    };

    let result = tokio::time::timeout(delivery_timeout, deliverer.deliver(subscriber, message))
        .await
        .unwrap_or(Err(DeliveryError::Timeout(delivery_timeout)));

    match result {
        Ok(()) => {
            info!(
                partition,
                id = message.id,
                topic = %message.topic,
                "Message from {} sent successfully to {}",
                message.sender,
                subscriber
            );
            Status::Success
        }
        Err(e) => {
            warn!(
                partition,
                id = message.id,
                topic = %message.topic,
                "Message from {} failed to send to {}: {}",
                message.sender,
                subscriber,
                e
            );
            Status::Failed
        }
    }
}

fn log_invalid(partition: usize, message: &Message) {
    let err = BrokerError::InvalidOperation {
        action: message.action.to_string(),
        topic: message.topic.clone(),
    };
    warn!(partition, id = message.id, "{err}");
}
