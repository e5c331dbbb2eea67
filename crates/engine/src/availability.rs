//! Tombstone-driven availability recovery.
//!
//! A delete applied while the index is still being built must not be lost:
//! the builder could later replay the entity's old key and resurface it.
//! The recovery path records a tombstone with the builder and promotes the
//! bucket to `Available` once the builder reports it has caught up.

use chaindex_types::{BucketId, EntityRef, IndexKey, IndexStatus};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::state::BucketState;
use crate::traits::TombstoneWriter;

/// Runs tombstone recovery after a delete was applied while the bucket was
/// not `Available`.
///
/// The tombstone is recorded twice under some interleavings: once
/// speculatively for the delete itself, and once more if the entity is
/// confirmed absent from its before-image entry after the first call
/// suspended. The writer must treat both calls as one logical tombstone.
pub(crate) async fn recover_after_unavailable_delete(
    bucket: BucketId,
    state: &Mutex<BucketState>,
    tombstones: &dyn TombstoneWriter,
    entity: EntityRef,
    before_key: &IndexKey,
) {
    debug!(%bucket, %entity, key = %before_key, "recording tombstone for delete seen while unavailable");
    let caught_up = tombstones.add_tombstone(entity).await;
    promote_if_caught_up(bucket, state, caught_up);

    // The first call suspended; an interleaved turn may have re-inserted the
    // entity. Only confirm the tombstone if it is still absent.
    let still_absent = {
        let state = state.lock();
        state
            .entries
            .get(before_key)
            .map_or(true, |entry| !entry.values.contains(&entity))
    };
    if still_absent {
        let caught_up = tombstones.add_tombstone(entity).await;
        promote_if_caught_up(bucket, state, caught_up);
    }
}

/// Moves the bucket from `UnderConstruction` to `Available` once the
/// builder has caught up. Any other status is left untouched; `Disposed` in
/// particular is never resurrected.
fn promote_if_caught_up(bucket: BucketId, state: &Mutex<BucketState>, caught_up: bool) {
    if !caught_up {
        return;
    }
    let mut state = state.lock();
    if state.status == IndexStatus::UnderConstruction {
        state.status = IndexStatus::Available;
        info!(%bucket, "index bucket caught up, now available");
    }
}
