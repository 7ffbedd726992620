//! Broker engine
//!
//! [`Broker`] is the context object built once at startup. It owns the
//! partition layout, one worker task and bounded queue per partition, and
//! the optional persistence sink task. Nothing in it changes after
//! construction. Ingress goes through the [`Router`] it hands out.
//!
//! Shutdown signals every worker, waits for each to cancel its retries and
//! drain its queue, and then waits for the sink to flush what the workers
//! forwarded.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::broker::delivery::Deliver;
use crate::broker::partition::PartitionTable;
use crate::broker::retry::{RetryPolicy, RetryScheduler};
use crate::broker::router::Router;
use crate::broker::worker::{Worker, WorkerReport};
use crate::config::Settings;
use crate::persistence::{BatchStore, PersistenceSink, Record};
use crate::utils::error::BrokerResult;

#[derive(Debug)]
pub struct Broker {
    router: Router,
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<WorkerReport>>,
    sink: Option<JoinHandle<()>>,
}

impl Broker {
    /// Starts the workers without a persistence sink.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<D: Deliver>(settings: &Settings, deliverer: D) -> BrokerResult<Self> {
        settings.validate()?;
        let table = PartitionTable::new(settings.broker.key_range, settings.broker.partitions)?;
        Ok(Self::spawn(settings, table, deliverer, None))
    }

    /// Starts the workers and a sink task archiving terminal messages to `store`.
    pub fn start_with_persistence<D: Deliver, S: BatchStore>(
        settings: &Settings,
        deliverer: D,
        store: S,
    ) -> BrokerResult<Self> {
        settings.validate()?;
        let table = PartitionTable::new(settings.broker.key_range, settings.broker.partitions)?;

        let (records, inbox) = mpsc::channel(settings.broker.queue_capacity);
        let sink = PersistenceSink::new(
            store,
            settings.persistence.batch_threshold,
            settings.persistence.flush_attempts,
        );
        let handle = tokio::spawn(sink.run(inbox));

        Ok(Self::spawn(settings, table, deliverer, Some((records, handle))))
    }

    fn spawn<D: Deliver>(
        settings: &Settings,
        table: PartitionTable,
        deliverer: D,
        sink: Option<(mpsc::Sender<Record>, JoinHandle<()>)>,
    ) -> Self {
        let (records, sink_handle) = sink.unzip();
        let table = Arc::new(table);
        let deliverer = Arc::new(deliverer);
        let policy = RetryPolicy::from(&settings.retry);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let mut queues = Vec::with_capacity(table.len());
        let mut workers = Vec::with_capacity(table.len());

        for partition in 0..table.len() {
            let (queue, inbox) = mpsc::channel(settings.broker.queue_capacity);
            let retries = RetryScheduler::new(partition, policy, queue.clone());
            let worker = Worker::new(
                partition,
                inbox,
                deliverer.clone(),
                settings.broker.delivery_timeout(),
                retries,
                shutdown_rx.clone(),
            )
            .with_sink(records.clone());

            workers.push(tokio::spawn(worker.run()));
            queues.push(queue);
        }

        info!(
            partitions = table.len(),
            key_range = settings.broker.key_range,
            queue_capacity = settings.broker.queue_capacity,
            "Broker started"
        );

        Self {
            router: Router::new(table, queues),
            shutdown,
            workers,
            sink: sink_handle,
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Stops every worker, drains their queues and flushes the sink.
    pub async fn shutdown(self) -> Vec<WorkerReport> {
        info!("Shutting down broker");
        let _ = self.shutdown.send(true);

        let mut reports = Vec::with_capacity(self.workers.len());
        for worker in self.workers {
            match worker.await {
                Ok(report) => reports.push(report),
                Err(e) => error!("Worker task failed: {e}"),
            }
        }

        if let Some(sink) = self.sink {
            if let Err(e) = sink.await {
                error!("Persistence sink task failed: {e}");
            }
        }

        info!("Broker stopped");
        reports
    }
}
