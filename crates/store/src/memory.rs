//! In-memory state store for testing and embedded use.

use std::collections::HashMap;

use chaindex_types::BucketId;
use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::{Result, StateStore};

/// State store keeping every bucket record in process memory.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    records: Mutex<HashMap<BucketId, Vec<u8>>>,
}

impl MemoryStateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buckets with a stored record.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether no records are stored.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl StateStore for MemoryStateStore {
    fn write_state(&self, bucket: BucketId, payload: Vec<u8>) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.records.lock().insert(bucket, payload);
            Ok(())
        })
    }

    fn read_state(&self, bucket: BucketId) -> BoxFuture<'_, Result<Option<Vec<u8>>>> {
        Box::pin(async move { Ok(self.records.lock().get(&bucket).cloned()) })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_and_read_back() {
        let store = MemoryStateStore::new();
        let bucket = BucketId::new(1);

        store.write_state(bucket, vec![1, 2, 3]).await.expect("write");
        let record = store.read_state(bucket).await.expect("read");
        assert_eq!(record, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_write_replaces_previous_record() {
        let store = MemoryStateStore::new();
        let bucket = BucketId::new(1);

        store.write_state(bucket, vec![1]).await.expect("write");
        store.write_state(bucket, vec![2]).await.expect("write");

        let record = store.read_state(bucket).await.expect("read");
        assert_eq!(record, Some(vec![2]));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_read_missing_bucket() {
        let store = MemoryStateStore::new();
        let record = store.read_state(BucketId::new(9)).await.expect("read");
        assert_eq!(record, None);
        assert!(store.is_empty());
    }
}
