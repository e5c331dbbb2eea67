//! Seams to the surrounding runtime.
//!
//! The index builder and the bucket provisioner are owned by the hosting
//! process; the engine only depends on these narrow traits so tests can
//! substitute in-process fakes.

use std::sync::Arc;

use chaindex_types::{BucketId, EntityRef};
use futures::future::BoxFuture;

use crate::bucket::IndexBucket;

/// Records delete tombstones with the external index builder.
pub trait TombstoneWriter: Send + Sync {
    /// Durably records that `entity` was deleted while the index was still
    /// being built.
    ///
    /// Returns `true` once the builder has fully caught up, at which point
    /// the bucket may become available. Must be idempotent: the recovery
    /// path calls this up to twice for the same entity.
    fn add_tombstone(&self, entity: EntityRef) -> BoxFuture<'_, bool>;
}

/// Creates and resolves chained buckets.
///
/// Identity assignment is split from activation so a bucket can record its
/// successor's identity without suspending: [`allocate`](Self::allocate) is
/// synchronous and only reserves an id, [`open`](Self::open) activates the
/// bucket behind that id.
pub trait BucketProvisioner: Send + Sync {
    /// Reserves the identity of a new bucket without activating it.
    fn allocate(&self) -> BucketId;

    /// Activates the bucket behind `id`, restoring persisted state if any.
    fn open(&self, id: BucketId) -> BoxFuture<'_, chaindex_store::Result<Arc<IndexBucket>>>;

    /// Releases a disposed bucket's activation.
    fn retire(&self, id: BucketId);
}
