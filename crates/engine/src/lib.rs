//! Bucket-level engine of a distributed secondary hash index.
//!
//! Each [`IndexBucket`] owns an in-memory map from index key to the set of
//! entities matching that key, group-commits that map through a pluggable
//! [`chaindex_store::StateStore`], and chains to a successor bucket when it
//! overflows its distinct-key capacity. Updates and lookups route through
//! the chain transparently.
//!
//! The engine provides:
//!
//! - Entry storage with a new-key-only capacity check
//! - A pure update engine applying insert/update/delete member updates
//! - Availability tracking with tombstone-driven recovery for deletes seen
//!   while the index is still being built
//! - A write coordinator combining concurrent persistence requests into one
//!   physical write with bounded retry
//! - Eager, streaming, and unique lookups with chain traversal

#![deny(unsafe_code)]

mod availability;
mod bucket;
mod chain;
mod error;
mod persistence;
mod provision;
mod state;
mod traits;
mod update;

pub use bucket::{IndexBucket, LookupEvent, ResultSink};
pub use error::{IndexError, Result};
pub use persistence::{CommitError, WriteCoordinator, WriteError};
pub use provision::LocalProvisioner;
pub use state::{BucketEntry, BucketState, EntryStore};
pub use traits::{BucketProvisioner, TombstoneWriter};
pub use update::{apply_member_update, UpdateOutcome};
