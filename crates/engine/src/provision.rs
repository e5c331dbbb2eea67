//! In-process bucket provisioning.
//!
//! [`LocalProvisioner`] stands in for the surrounding runtime's placement
//! service: it hands out bucket identities, activates buckets on demand
//! (restoring persisted state when the store has a record), and keeps the
//! live activations in a map so chained buckets resolve to the same
//! instance.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chaindex_store::{Result as StoreResult, StateStore};
use chaindex_types::{decode, BucketConfig, BucketId};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::bucket::IndexBucket;
use crate::state::BucketState;
use crate::traits::{BucketProvisioner, TombstoneWriter};

/// Activates index buckets within the current process.
pub struct LocalProvisioner {
    store: Arc<dyn StateStore>,
    tombstones: Arc<dyn TombstoneWriter>,
    config: BucketConfig,
    buckets: Mutex<HashMap<BucketId, Arc<IndexBucket>>>,
    next_id: AtomicU64,
    // Buckets hold the provisioner for chaining; the weak self-reference
    // breaks the resulting cycle.
    self_ref: Weak<LocalProvisioner>,
}

impl LocalProvisioner {
    /// Creates a provisioner over `store` and `tombstones`.
    pub fn new(
        store: Arc<dyn StateStore>,
        tombstones: Arc<dyn TombstoneWriter>,
        config: BucketConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            store,
            tombstones,
            config,
            buckets: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            self_ref: self_ref.clone(),
        })
    }

    /// Allocates and opens the first bucket of a new index chain.
    pub async fn open_root(&self) -> StoreResult<Arc<IndexBucket>> {
        let id = self.allocate();
        self.open(id).await
    }

    /// Number of live activations.
    pub fn active_buckets(&self) -> usize {
        self.buckets.lock().len()
    }
}

impl BucketProvisioner for LocalProvisioner {
    fn allocate(&self) -> BucketId {
        BucketId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn open(&self, id: BucketId) -> BoxFuture<'_, StoreResult<Arc<IndexBucket>>> {
        Box::pin(async move {
            if let Some(bucket) = self.buckets.lock().get(&id) {
                return Ok(Arc::clone(bucket));
            }

            let provisioner: Arc<dyn BucketProvisioner> =
                self.self_ref.upgrade().ok_or_else(|| chaindex_store::Error::Backend {
                    reason: "provisioner dropped while opening a bucket".to_string(),
                })?;

            let state = match self.store.read_state(id).await? {
                Some(bytes) => decode::<BucketState>(&bytes).map_err(|err| {
                    chaindex_store::Error::Backend {
                        reason: format!("corrupt state record for {id}: {err}"),
                    }
                })?,
                None => BucketState::new(),
            };

            let bucket = IndexBucket::from_state(
                id,
                state,
                Arc::clone(&self.store),
                Arc::clone(&self.tombstones),
                provisioner,
                &self.config,
            );
            debug!(bucket = %id, "activated index bucket");

            // Another open for the same id may have won while reading; keep
            // whichever activation landed first.
            let mut buckets = self.buckets.lock();
            match buckets.get(&id) {
                Some(existing) => {
                    warn!(bucket = %id, "concurrent activation, keeping the existing instance");
                    Ok(Arc::clone(existing))
                }
                None => {
                    buckets.insert(id, Arc::clone(&bucket));
                    Ok(bucket)
                }
            }
        })
    }

    fn retire(&self, id: BucketId) {
        if self.buckets.lock().remove(&id).is_some() {
            debug!(bucket = %id, "retired index bucket");
        }
    }
}

impl std::fmt::Debug for LocalProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalProvisioner")
            .field("active_buckets", &self.active_buckets())
            .finish_non_exhaustive()
    }
}
