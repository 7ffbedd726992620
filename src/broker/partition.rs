//! Topic partitioning
//!
//! Topics are assigned to partitions by hashing the topic name into the
//! integer space `[0, key_range)` and looking the value up in a sorted
//! boundary table. Partition `i` owns `(boundary[i-1], boundary[i]]`, with
//! an implicit lower bound of 0 for the first partition.
//!
//! The assignment depends only on the topic name and the two startup
//! parameters, so it is stable for the lifetime of the broker and across
//! processes started with the same configuration.

use crate::utils::error::{BrokerError, BrokerResult};

/// Builds the ascending boundary table for `partitions` equal slices of
/// `[0, key_range)`.
///
/// When `key_range` is not a multiple of `partitions` the last boundary is
/// clamped to `key_range`, so the last partition absorbs the remainder and
/// no hash value is left unroutable.
pub fn build_partitions(key_range: u64, partitions: usize) -> Vec<u64> {
    if partitions == 0 {
        return Vec::new();
    }

    let step = key_range / partitions as u64;
    let mut boundaries: Vec<u64> = (1..=partitions as u64).map(|i| step * i).collect();

    if let Some(last) = boundaries.last_mut() {
        *last = (*last).max(key_range);
    }
    boundaries
}

/// Hashes `key` into `[0, max_range)`.
///
/// The first 8 bytes of the blake3 digest are read as a little-endian `u64`
/// and reduced modulo `max_range`. A `max_range` of zero yields 0.
pub fn hash(key: &str, max_range: u64) -> u64 {
    let digest = blake3::hash(key.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(prefix).checked_rem(max_range).unwrap_or(0)
}

/// Returns the index of the first boundary `>= value`, or `None` if `value`
/// lies above the last boundary.
pub fn find_partition(boundaries: &[u64], value: u64) -> Option<usize> {
    let index = boundaries.partition_point(|&boundary| boundary < value);
    (index < boundaries.len()).then_some(index)
}

/// The immutable partition layout shared by the router and the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionTable {
    key_range: u64,
    boundaries: Vec<u64>,
}

impl PartitionTable {
    pub fn new(key_range: u64, partitions: usize) -> BrokerResult<Self> {
        if partitions == 0 {
            return Err(BrokerError::InvalidConfig(
                "at least one partition is required".to_string(),
            ));
        }
        if key_range < partitions as u64 {
            return Err(BrokerError::InvalidConfig(format!(
                "key range {key_range} is smaller than partition count {partitions}"
            )));
        }

        Ok(Self {
            key_range,
            boundaries: build_partitions(key_range, partitions),
        })
    }

    /// Partition owning `topic`, if its hash falls inside the table.
    pub fn partition_for(&self, topic: &str) -> Option<usize> {
        find_partition(&self.boundaries, self.hash(topic))
    }

    pub fn hash(&self, topic: &str) -> u64 {
        hash(topic, self.key_range)
    }

    pub fn boundaries(&self) -> &[u64] {
        &self.boundaries
    }

    pub fn len(&self) -> usize {
        self.boundaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boundaries.is_empty()
    }
}
