//! Persistence provider seam for chaindex buckets.
//!
//! A bucket persists its state through the [`StateStore`] trait. The payload
//! handed to the store is the opaque postcard encoding of the bucket's state
//! record; the store defines no additional framing and is free to garbage
//! collect or overwrite records of retired buckets.
//!
//! [`MemoryStateStore`] is the in-process implementation used by tests and
//! embedded deployments; durable providers live behind the same trait.

#![deny(unsafe_code)]

mod error;
mod memory;

pub use error::{Error, Result};
pub use memory::MemoryStateStore;

use chaindex_types::BucketId;
use futures::future::BoxFuture;

/// Durable storage beneath a bucket's persistence requests.
///
/// Implementations must tolerate repeated writes of the same bucket; the
/// engine's group commit makes back-to-back writes of fresh snapshots the
/// common case.
pub trait StateStore: Send + Sync {
    /// Durably records `payload` as the current state of `bucket`,
    /// replacing any previous record.
    fn write_state(&self, bucket: BucketId, payload: Vec<u8>) -> BoxFuture<'_, Result<()>>;

    /// Reads the most recently written record of `bucket`, if any.
    ///
    /// Used on activation to restore a bucket that was deactivated or
    /// relocated.
    fn read_state(&self, bucket: BucketId) -> BoxFuture<'_, Result<Option<Vec<u8>>>>;
}
