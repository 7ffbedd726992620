use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::persistence::{BatchStore, Record};
use crate::utils::error::{PersistenceError, PersistenceResult};

/// Result of a single flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Empty,
    Persisted(usize),
    DeadLettered(usize),
    Lost(usize),
}

/// Buffers archived records and writes them in threshold-sized batches.
///
/// The buffer is owned by whichever task drives the sink, normally the
/// single task running [`PersistenceSink::run`]. Store writes block on disk,
/// so they run on tokio's blocking pool.
pub struct PersistenceSink<S: BatchStore> {
    store: Arc<S>,
    buffer: Vec<Record>,
    threshold: usize,
    flush_attempts: u32,
    retry_backoff: Duration,
}

impl<S: BatchStore> PersistenceSink<S> {
    pub fn new(store: S, threshold: usize, flush_attempts: u32) -> Self {
        let threshold = threshold.max(1);
        Self {
            store: Arc::new(store),
            buffer: Vec::with_capacity(threshold),
            threshold,
            flush_attempts: flush_attempts.max(1),
            retry_backoff: Duration::from_millis(100),
        }
    }

    /// Base pause between failed write attempts; attempt `n` waits `n` times this.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Buffers `record`, flushing if the threshold is reached.
    pub async fn push(&mut self, record: Record) -> Option<FlushOutcome> {
        self.buffer.push(record);
        if self.buffer.len() >= self.threshold {
            Some(self.flush().await)
        } else {
            None
        }
    }

    pub async fn flush(&mut self) -> FlushOutcome {
        if self.buffer.is_empty() {
            return FlushOutcome::Empty;
        }
        let batch = Arc::new(std::mem::replace(
            &mut self.buffer,
            Vec::with_capacity(self.threshold),
        ));
        let count = batch.len();

        for attempt in 1..=self.flush_attempts {
            match self.write(&batch, |store, records| store.insert_batch(records)).await {
                Ok(()) => {
                    info!("Wrote {count} records to the store");
                    return FlushOutcome::Persisted(count);
                }
                Err(e) => {
                    warn!(
                        attempt,
                        "Unable to persist batch of {count} records: {e}"
                    );
                    if attempt < self.flush_attempts {
                        tokio::time::sleep(self.retry_backoff * attempt).await;
                    }
                }
            }
        }

        match self.write(&batch, |store, records| store.dead_letter(records)).await {
            Ok(()) => {
                warn!("Moved batch of {count} records to dead letter storage");
                FlushOutcome::DeadLettered(count)
            }
            Err(e) => {
                error!("Lost batch of {count} records, dead letter write failed: {e}");
                FlushOutcome::Lost(count)
            }
        }
    }

    async fn write<F>(&self, batch: &Arc<Vec<Record>>, op: F) -> PersistenceResult<()>
    where
        F: FnOnce(&S, &[Record]) -> PersistenceResult<()> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let batch = Arc::clone(batch);
        tokio::task::spawn_blocking(move || op(store.as_ref(), batch.as_slice()))
            .await
            .map_err(|e| PersistenceError::Write(format!("store task failed: {e}")))?
    }

    /// Drains `records` until every sender is gone, then flushes what is left.
    pub async fn run(mut self, mut records: mpsc::Receiver<Record>) {
        while let Some(record) = records.recv().await {
            self.push(record).await;
        }
        self.flush().await;
        info!("Persistence sink closed");
    }
}
