//! Group-commit write coordinator.
//!
//! Turns many logically-concurrent persistence requests into few physical
//! writes. Every requester's mutation is already in the shared in-memory
//! state by the time it asks to persist, so whichever request executes a
//! write satisfies every request enqueued before the snapshot was taken.
//!
//! ## Protocol
//!
//! 1. Each request takes a monotonically increasing id and adds it to the
//!    pending set.
//! 2. Requests queue on an asynchronous gate; only one physical write is in
//!    flight at a time.
//! 3. A request that finds its id gone from the pending set was absorbed by
//!    an earlier holder's write and returns immediately.
//! 4. Otherwise it drains the whole pending set and writes, retrying up to
//!    the configured bound with a fresh snapshot per attempt.
//! 5. Exhausting the retries marks every absorbed request as failed, so each
//!    of them surfaces the fatal error instead of silently succeeding.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chaindex_types::{BucketConfig, CodecError};
use parking_lot::Mutex;
use snafu::Snafu;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, warn};

/// A single write attempt failed.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum WriteError {
    /// Encoding the state record failed.
    #[snafu(display("state encoding failed: {source}"))]
    Encode {
        /// The underlying codec error.
        source: CodecError,
    },

    /// The state store rejected the write.
    #[snafu(display("state store rejected the write: {source}"))]
    Store {
        /// The underlying provider error.
        source: chaindex_store::Error,
    },
}

/// A commit failed fatally.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CommitError {
    /// The executing request exhausted its write retries.
    #[snafu(display("durable write failed after {attempts} attempts: {source}"))]
    RetriesExhausted {
        /// Total write attempts made.
        attempts: u32,
        /// The final attempt's error.
        source: WriteError,
    },

    /// This request was absorbed into a commit group whose write failed.
    #[snafu(display("a combined commit attempt failed before this request was written"))]
    GroupFailed,
}

#[derive(Debug, Default)]
struct CommitQueue {
    /// Requests waiting to be satisfied by the next physical write.
    pending: HashSet<u64>,
    /// Requests absorbed by a write that exhausted its retries.
    failed: HashSet<u64>,
}

/// Combines concurrent persistence requests into single durable writes.
#[derive(Debug)]
pub struct WriteCoordinator {
    /// Serializes physical writes. Asynchronous so queued requests suspend
    /// without blocking other turns.
    gate: AsyncMutex<()>,
    queue: Mutex<CommitQueue>,
    next_request_id: AtomicU64,
    retry_limit: u32,
    retry_delay: Duration,
}

impl WriteCoordinator {
    /// Creates a coordinator with the config's retry bounds.
    pub fn new(config: &BucketConfig) -> Self {
        Self {
            gate: AsyncMutex::new(()),
            queue: Mutex::new(CommitQueue::default()),
            next_request_id: AtomicU64::new(0),
            retry_limit: config.write_retry_limit,
            retry_delay: config.write_retry_delay,
        }
    }

    /// Number of requests currently waiting on a physical write.
    pub fn pending_requests(&self) -> usize {
        self.queue.lock().pending.len()
    }

    /// Durably records the caller's already-applied mutation.
    ///
    /// `write` is invoked once per attempt and must snapshot the current
    /// state when called, so a combined write carries every absorbed
    /// request's mutation.
    ///
    /// # Errors
    ///
    /// Returns [`CommitError::RetriesExhausted`] if this request executed
    /// the write and ran out of retries, or [`CommitError::GroupFailed`] if
    /// another request did so on this request's behalf.
    pub async fn commit<F, Fut>(&self, write: F) -> Result<(), CommitError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<(), WriteError>>,
    {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.queue.lock().pending.insert(request_id);

        let _gate = self.gate.lock().await;

        let group = {
            let mut queue = self.queue.lock();
            if queue.failed.remove(&request_id) {
                return GroupFailedSnafu.fail();
            }
            if !queue.pending.contains(&request_id) {
                // A previous holder's write already included this request's
                // mutation.
                return Ok(());
            }
            std::mem::take(&mut queue.pending)
        };
        debug!(request_id, absorbed = group.len(), "executing combined commit");

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match write().await {
                Ok(()) => return Ok(()),
                Err(source) => {
                    if attempts > self.retry_limit {
                        error!(request_id, attempts, error = %source, "commit retries exhausted");
                        let mut queue = self.queue.lock();
                        queue.failed.extend(group.iter().copied().filter(|id| *id != request_id));
                        return Err(CommitError::RetriesExhausted { attempts, source });
                    }
                    warn!(
                        request_id,
                        attempt = attempts,
                        error = %source,
                        "durable write failed, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }
}
