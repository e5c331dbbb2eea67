//! Successor creation and resolution.
//!
//! The chain is append-only and singly linked: `next` is assigned at most
//! once, under the state lock, and the link is persisted before any update
//! is forwarded. A successor used before its link is durable could be
//! orphaned by a restart.

use std::sync::Arc;

use chaindex_types::BucketId;
use snafu::ResultExt;
use tracing::info;

use crate::bucket::IndexBucket;
use crate::error::{PersistenceSnafu, Result, SuccessorUnavailableSnafu};

impl IndexBucket {
    /// Identity of the successor bucket, if one has been linked.
    pub fn linked_successor(&self) -> Option<BucketId> {
        self.state.lock().next
    }

    /// Returns the successor bucket, creating and durably linking one on
    /// first overflow.
    ///
    /// Identity assignment happens synchronously under the state lock, so
    /// interleaved overflows all observe the same successor. The link is
    /// persisted before the successor is opened.
    pub(crate) async fn ensure_successor(&self) -> Result<Arc<IndexBucket>> {
        let (next, newly_linked) = {
            let mut state = self.state.lock();
            match state.next {
                Some(next) => (next, false),
                None => {
                    let next = self.provisioner.allocate();
                    state.next = Some(next);
                    (next, true)
                }
            }
        };
        if newly_linked {
            info!(bucket = %self.id, successor = %next, "bucket overflowed, chaining successor");
        }
        // Every overflowing turn waits for the link to be durable, not just
        // the one that assigned it: a turn that finds `next` already set may
        // be racing the assigning turn's still-inflight write, and the
        // successor must never hold forwarded state the predecessor does not
        // durably point to. The commit gate combines these into the same
        // physical write.
        self.persist().await.context(PersistenceSnafu { bucket: self.id })?;
        self.open_successor(next).await
    }

    /// Opens the already-linked successor `next`.
    pub(crate) async fn open_successor(&self, next: BucketId) -> Result<Arc<IndexBucket>> {
        self.provisioner
            .open(next)
            .await
            .context(SuccessorUnavailableSnafu { bucket: next })
    }
}
