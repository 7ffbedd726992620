use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::tempdir;
use tokio::sync::mpsc;

use super::{BatchStore, FlushOutcome, PersistenceSink, Record, SledStore};
use crate::broker::message::{Action, Message, Status};
use crate::utils::error::{PersistenceError, PersistenceResult};

fn record(id: u64) -> Record {
    let mut message = Message::new(id, Action::Publish, "orders", "alice", "hello");
    message.status = Status::Success;
    Record::from(&message)
}

/// In-memory store whose first `failures` batch writes fail.
#[derive(Clone, Default)]
struct MemoryStore {
    batches: Arc<Mutex<Vec<Vec<Record>>>>,
    dead: Arc<Mutex<Vec<Record>>>,
    failures: Arc<AtomicUsize>,
    dead_letter_fails: bool,
}

impl MemoryStore {
    fn failing(failures: usize) -> Self {
        Self {
            failures: Arc::new(AtomicUsize::new(failures)),
            ..Self::default()
        }
    }
}

impl BatchStore for MemoryStore {
    fn insert_batch(&self, records: &[Record]) -> PersistenceResult<()> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(PersistenceError::Write("store unavailable".to_string()));
        }
        self.batches.lock().unwrap().push(records.to_vec());
        Ok(())
    }

    fn dead_letter(&self, records: &[Record]) -> PersistenceResult<()> {
        if self.dead_letter_fails {
            return Err(PersistenceError::Write("dead letter unavailable".to_string()));
        }
        self.dead.lock().unwrap().extend_from_slice(records);
        Ok(())
    }
}

#[test]
fn test_record_from_message() {
    let mut message = Message::new(7, Action::Subscribe, "orders", "http://a", "");
    message.status = Status::Invalid;
    let record = Record::from(&message);
    assert_eq!(record.id, 7);
    assert_eq!(record.action, "Subscribe");
    assert_eq!(record.topic, "orders");
    assert_eq!(record.sender, "http://a");
    assert_eq!(record.status, Status::Invalid);
    assert_eq!(record.timestamp, message.timestamp);
}

#[test]
fn test_sled_store_insert_and_load() {
    let dir = tempdir().unwrap();
    let store = SledStore::open(dir.path().to_str().unwrap()).unwrap();

    store.insert_batch(&[record(1), record(2)]).unwrap();
    store.dead_letter(&[record(3)]).unwrap();

    let mut ids: Vec<u64> = store.load_records().iter().map(|r| r.id).collect();
    ids.sort();
    assert_eq!(ids, vec![1, 2]);

    let dead = store.load_dead_letters();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].id, 3);
}

#[test]
fn test_sled_store_empty_trees() {
    let dir = tempdir().unwrap();
    let store = SledStore::open(dir.path().to_str().unwrap()).unwrap();
    assert!(store.load_records().is_empty());
    assert!(store.load_dead_letters().is_empty());
}

#[tokio::test]
async fn test_sink_flushes_at_threshold() {
    let store = MemoryStore::default();
    let mut sink = PersistenceSink::new(store.clone(), 3, 1);

    assert_eq!(sink.push(record(1)).await, None);
    assert_eq!(sink.push(record(2)).await, None);
    assert_eq!(sink.buffered(), 2);
    assert_eq!(sink.push(record(3)).await, Some(FlushOutcome::Persisted(3)));
    assert_eq!(sink.buffered(), 0);

    let batches = store.batches.lock().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 3);
}

#[tokio::test]
async fn test_flush_of_empty_buffer_is_noop() {
    let store = MemoryStore::default();
    let mut sink = PersistenceSink::new(store.clone(), 3, 1);
    assert_eq!(sink.flush().await, FlushOutcome::Empty);
    assert!(store.batches.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_flush_retries_before_succeeding() {
    let store = MemoryStore::failing(2);
    let mut sink = PersistenceSink::new(store.clone(), 2, 3)
        .with_retry_backoff(Duration::from_millis(10));

    sink.push(record(1)).await;
    let outcome = sink.push(record(2)).await;

    assert_eq!(outcome, Some(FlushOutcome::Persisted(2)));
    assert_eq!(store.batches.lock().unwrap().len(), 1);
    assert!(store.dead.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_flush_dead_letters_after_exhausting_attempts() {
    let store = MemoryStore::failing(usize::MAX);
    let mut sink = PersistenceSink::new(store.clone(), 2, 3)
        .with_retry_backoff(Duration::from_millis(10));

    sink.push(record(1)).await;
    let outcome = sink.push(record(2)).await;

    assert_eq!(outcome, Some(FlushOutcome::DeadLettered(2)));
    assert!(store.batches.lock().unwrap().is_empty());
    assert_eq!(store.dead.lock().unwrap().len(), 2);
    // the buffer is cleared only because the records went somewhere
    assert_eq!(sink.buffered(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_flush_reports_lost_batch_when_dead_letter_fails() {
    let store = MemoryStore {
        dead_letter_fails: true,
        ..MemoryStore::failing(usize::MAX)
    };
    let mut sink = PersistenceSink::new(store, 1, 2).with_retry_backoff(Duration::from_millis(1));

    assert_eq!(sink.push(record(1)).await, Some(FlushOutcome::Lost(1)));
}

#[tokio::test]
async fn test_run_flushes_remainder_on_close() {
    let store = MemoryStore::default();
    let sink = PersistenceSink::new(store.clone(), 10, 1);
    let (tx, rx) = mpsc::channel(16);

    let handle = tokio::spawn(sink.run(rx));
    for id in 0..4 {
        tx.send(record(id)).await.unwrap();
    }
    drop(tx);
    handle.await.unwrap();

    let batches = store.batches.lock().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 4);
}

/// Remembers which thread each batch was written from.
#[derive(Clone, Default)]
struct ThreadRecordingStore {
    threads: Arc<Mutex<Vec<std::thread::ThreadId>>>,
}

impl BatchStore for ThreadRecordingStore {
    fn insert_batch(&self, _records: &[Record]) -> PersistenceResult<()> {
        self.threads
            .lock()
            .unwrap()
            .push(std::thread::current().id());
        Ok(())
    }

    fn dead_letter(&self, _records: &[Record]) -> PersistenceResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_flush_writes_off_the_runtime_thread() {
    let store = ThreadRecordingStore::default();
    let mut sink = PersistenceSink::new(store.clone(), 1, 1);

    assert_eq!(sink.push(record(1)).await, Some(FlushOutcome::Persisted(1)));

    let threads = store.threads.lock().unwrap();
    assert_eq!(threads.len(), 1);
    assert_ne!(threads[0], std::thread::current().id());
}
