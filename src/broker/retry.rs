//! Retry scheduling for failed deliveries
//!
//! Each failed delivery becomes a delayed task that sleeps for the backoff
//! interval and then resubmits the message to its own partition's queue,
//! where it interleaves with newer traffic. The scheduler is owned by the
//! partition's worker and keeps every outstanding timer in a `JoinSet`, so
//! retries can be counted, reaped and cancelled as a group at shutdown.
//! A copy of each waiting message is kept by task id, so cancelling hands
//! the messages back instead of dropping them.
//!
//! Backoff is `base_delay * 2^retry_count`, capped at `max_delay`. The
//! worker increments `retry_count` before handing a message over, so the
//! first retry waits two units, the second four, and so on. Once
//! `retry_count` exceeds `max_retries` the message is handed back as
//! exhausted instead of being rescheduled.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, warn};

use crate::broker::message::Message;
use crate::config::RetrySettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration, max_retries: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_retries,
        }
    }

    /// Delay before retrying a message that has failed `retry_count` times.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let factor = 1u128.checked_shl(retry_count).unwrap_or(u128::MAX);
        let millis = self.base_delay.as_millis().saturating_mul(factor);
        let capped = millis.min(self.max_delay.as_millis());
        Duration::from_millis(u64::try_from(capped).unwrap_or(u64::MAX))
    }

    pub fn allows(&self, retry_count: u32) -> bool {
        retry_count <= self.max_retries
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self::new(
            settings.base_delay(),
            settings.max_delay(),
            settings.max_retries,
        )
    }
}

/// What happened to a message handed to [`RetryScheduler::schedule`].
#[derive(Debug)]
pub enum Scheduled {
    Retry { delay: Duration },
    /// The retry budget is spent; the message is returned to the caller.
    Exhausted(Message),
}

pub struct RetryScheduler {
    partition: usize,
    policy: RetryPolicy,
    queue: mpsc::Sender<Message>,
    pending: JoinSet<()>,
    waiting: HashMap<Id, Message>,
}

impl RetryScheduler {
    /// `queue` must be the inbound queue of the partition that owns the
    /// messages this scheduler will see.
    pub fn new(partition: usize, policy: RetryPolicy, queue: mpsc::Sender<Message>) -> Self {
        Self {
            partition,
            policy,
            queue,
            pending: JoinSet::new(),
            waiting: HashMap::new(),
        }
    }

    pub fn schedule(&mut self, message: Message) -> Scheduled {
        if !self.policy.allows(message.retry_count) {
            warn!(
                partition = self.partition,
                id = message.id,
                topic = %message.topic,
                retry_count = message.retry_count,
                "Giving up on message after {} retries",
                self.policy.max_retries
            );
            return Scheduled::Exhausted(message);
        }

        let delay = self.policy.delay_for(message.retry_count);
        debug!(
            partition = self.partition,
            id = message.id,
            topic = %message.topic,
            retry_count = message.retry_count,
            "Message will be retried in {:?}",
            delay
        );

        let queue = self.queue.clone();
        let partition = self.partition;
        let resubmit = message.clone();
        let handle = self.pending.spawn(async move {
            tokio::time::sleep(delay).await;
            let id = resubmit.id;
            if queue.send(resubmit).await.is_err() {
                warn!(partition, id, "Partition queue closed before retry could be resubmitted");
            }
        });
        self.waiting.insert(handle.id(), message);

        Scheduled::Retry { delay }
    }

    /// Retry tasks that have not been reaped yet, finished or not.
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    /// Waits for the next retry task to finish.
    pub async fn join_next(&mut self) -> Option<Result<(), JoinError>> {
        let result = self.pending.join_next_with_id().await?;
        Some(self.settle(result).map_err(|(e, _)| e))
    }

    /// Drops bookkeeping for retries that already fired.
    pub fn reap(&mut self) -> usize {
        let mut reaped = 0;
        while let Some(result) = self.pending.try_join_next_with_id() {
            if let Err((e, _)) = self.settle(result) {
                if !e.is_cancelled() {
                    warn!(partition = self.partition, "Retry task failed: {e}");
                }
            }
            reaped += 1;
        }
        reaped
    }

    /// Aborts every retry that has not resubmitted its message yet and
    /// returns the messages it was holding.
    pub async fn cancel_all(&mut self) -> Vec<Message> {
        self.pending.abort_all();

        let mut cancelled = Vec::new();
        while let Some(result) = self.pending.join_next_with_id().await {
            if let Err((e, Some(message))) = self.settle(result) {
                if !e.is_cancelled() {
                    warn!(partition = self.partition, id = message.id, "Retry task failed: {e}");
                }
                cancelled.push(message);
            }
        }
        cancelled
    }

    /// Forgets the copy held for a finished task. A task that did not run to
    /// completion never resubmitted, so its copy is returned with the error.
    fn settle(
        &mut self,
        result: Result<(Id, ()), JoinError>,
    ) -> Result<(), (JoinError, Option<Message>)> {
        match result {
            Ok((id, ())) => {
                self.waiting.remove(&id);
                Ok(())
            }
            Err(e) => {
                let message = self.waiting.remove(&e.id());
                Err((e, message))
            }
        }
    }
}
