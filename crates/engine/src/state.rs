//! Persisted bucket state and the entry store.
//!
//! [`BucketState`] is the unit of persistence: the key-to-entry map, the
//! availability status, and the optional link to the successor bucket. The
//! persisted payload is exactly the postcard encoding of this record.

use std::collections::{HashMap, HashSet};

use chaindex_types::{BucketId, CapacityPolicy, EntityRef, IndexKey, IndexStatus};
use serde::{Deserialize, Serialize};

/// The set of entities currently matching one index key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketEntry {
    /// Entities matching the key.
    pub values: HashSet<EntityRef>,
    /// True while an update affecting this entry is logically in flight.
    /// Tentative entries are excluded from every lookup path.
    pub tentative: bool,
}

impl BucketEntry {
    /// An entry holding a single entity.
    pub fn of(entity: EntityRef) -> Self {
        Self { values: HashSet::from([entity]), tentative: false }
    }

    /// Whether the entry holds no entities.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// In-memory map from index key to its entry.
///
/// Pure map operations with no side effects. The capacity check only
/// considers *distinct keys*: growth of an existing entry never overflows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryStore {
    entries: HashMap<IndexKey, BucketEntry>,
}

impl EntryStore {
    /// Returns the entry for `key`, if present.
    pub fn get(&self, key: &IndexKey) -> Option<&BucketEntry> {
        self.entries.get(key)
    }

    /// Returns a mutable entry for `key`, if present.
    pub fn get_mut(&mut self, key: &IndexKey) -> Option<&mut BucketEntry> {
        self.entries.get_mut(key)
    }

    /// Inserts or replaces the entry for `key`.
    pub fn put(&mut self, key: IndexKey, entry: BucketEntry) {
        self.entries.insert(key, entry);
    }

    /// Removes and returns the entry for `key`.
    pub fn remove(&mut self, key: &IndexKey) -> Option<BucketEntry> {
        self.entries.remove(key)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Whether applying an insert of `key` would exceed `capacity`.
    ///
    /// Inserting into an existing key's entry never overflows; the bound is
    /// on distinct keys, not on total matching entities.
    pub fn would_overflow(&self, key: &IndexKey, capacity: &CapacityPolicy) -> bool {
        !self.entries.contains_key(key) && capacity.is_full(self.entries.len())
    }
}

/// The persisted state of one index bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketState {
    /// Key-to-entry map.
    pub entries: EntryStore,
    /// Availability of this bucket.
    pub status: IndexStatus,
    /// Identity of the successor bucket. Set at most once; the chain is
    /// append-only and singly linked.
    pub next: Option<BucketId>,
}

impl BucketState {
    /// Fresh state for a newly activated bucket.
    pub fn new() -> Self {
        Self { entries: EntryStore::default(), status: IndexStatus::Available, next: None }
    }
}

impl Default for BucketState {
    fn default() -> Self {
        Self::new()
    }
}
