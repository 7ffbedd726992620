//! Persistence layer backed by `sled`
//!
//! Records live in the `messages` tree and failed batches in the
//! `dead_letter` tree. Keys are prefixed with the record's timestamp, so
//! iteration yields records in chronological order; a UUID suffix keeps
//! keys unique when timestamps collide.

use serde::de::DeserializeOwned;
use sled::{Batch, Tree};
use uuid::Uuid;

use crate::persistence::{BatchStore, Record};
use crate::utils::error::{PersistenceError, PersistenceResult};

const MESSAGES_TREE: &str = "messages";
const DEAD_LETTER_TREE: &str = "dead_letter";

#[derive(Clone)]
pub struct SledStore {
    messages: Tree,
    dead_letters: Tree,
}

impl SledStore {
    /// Open or create a sled database at `path`.
    pub fn open(path: &str) -> PersistenceResult<Self> {
        let db = sled::open(path).map_err(|source| PersistenceError::Open {
            path: path.to_string(),
            source,
        })?;
        let messages = db.open_tree(MESSAGES_TREE)?;
        let dead_letters = db.open_tree(DEAD_LETTER_TREE)?;
        Ok(Self {
            messages,
            dead_letters,
        })
    }

    pub fn load_records(&self) -> Vec<Record> {
        load(&self.messages)
    }

    pub fn load_dead_letters(&self) -> Vec<Record> {
        load(&self.dead_letters)
    }
}

fn write(tree: &Tree, records: &[Record]) -> PersistenceResult<()> {
    let mut batch = Batch::default();
    for record in records {
        let key = format!("{:020}_{}", record.timestamp, Uuid::new_v4());
        batch.insert(key.as_bytes(), serde_json::to_vec(record)?);
    }
    tree.apply_batch(batch)?;
    tree.flush()?;
    Ok(())
}

fn load<T: DeserializeOwned>(tree: &Tree) -> Vec<T> {
    tree.iter()
        .filter_map(|res| res.ok())
        .filter_map(|(_, val)| serde_json::from_slice(&val).ok())
        .collect()
}

impl BatchStore for SledStore {
    fn insert_batch(&self, records: &[Record]) -> PersistenceResult<()> {
        write(&self.messages, records)
    }

    fn dead_letter(&self, records: &[Record]) -> PersistenceResult<()> {
        write(&self.dead_letters, records)
    }
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("db", &"sled::Db")
            .finish()
    }
}
