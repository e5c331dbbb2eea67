//! One bucket of a secondary hash index.
//!
//! An [`IndexBucket`] owns its [`BucketState`] exclusively. Map mutation is
//! synchronous under a short-lived lock that is never held across a
//! suspension point; the only asynchronous serialization is the write
//! coordinator's commit gate. Overflowing updates and missed lookups are
//! routed to the successor bucket through the provisioner.

use std::sync::Arc;

use chaindex_types::{
    encode, BucketConfig, BucketId, CapacityPolicy, EntityRef, IndexKey, IndexStatus, MemberUpdate,
};
use chaindex_store::StateStore;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use snafu::ResultExt;
use tracing::{debug, info, instrument};

use crate::availability::recover_after_unavailable_delete;
use crate::error::{
    DisposedSnafu, IndexError, KeyNotFoundSnafu, PersistenceSnafu, Result, UnavailableSnafu,
    UniquenessViolationSnafu,
};
use crate::persistence::{CommitError, EncodeSnafu, StoreSnafu, WriteCoordinator};
use crate::state::BucketState;
use crate::traits::{BucketProvisioner, TombstoneWriter};
use crate::update::{apply_member_update, UpdateOutcome};

/// Event pushed to a streaming lookup's sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupEvent {
    /// The entities matching the key in one bucket of the chain.
    Batch(Vec<EntityRef>),
    /// End of stream. Sent exactly once per lookup, by whichever bucket in
    /// the chain resolved the key.
    Complete,
}

/// Receiving end of a streaming lookup.
pub type ResultSink = tokio::sync::mpsc::Sender<LookupEvent>;

/// A single bucket in an index chain.
pub struct IndexBucket {
    pub(crate) id: BucketId,
    pub(crate) state: Mutex<BucketState>,
    pub(crate) coordinator: WriteCoordinator,
    pub(crate) store: Arc<dyn StateStore>,
    pub(crate) tombstones: Arc<dyn TombstoneWriter>,
    pub(crate) provisioner: Arc<dyn BucketProvisioner>,
}

/// Where a lookup resolved within this bucket.
enum Selection {
    /// A live entry for the key exists here.
    Found {
        values: Vec<EntityRef>,
        next: Option<BucketId>,
    },
    /// No live entry here; continue at the successor.
    Delegate(BucketId),
    /// No live entry and no successor.
    Missing,
}

impl IndexBucket {
    /// Creates a bucket with fresh, empty state.
    pub fn new(
        id: BucketId,
        store: Arc<dyn StateStore>,
        tombstones: Arc<dyn TombstoneWriter>,
        provisioner: Arc<dyn BucketProvisioner>,
        config: &BucketConfig,
    ) -> Arc<Self> {
        Self::from_state(id, BucketState::new(), store, tombstones, provisioner, config)
    }

    /// Creates a bucket over previously persisted state.
    pub fn from_state(
        id: BucketId,
        state: BucketState,
        store: Arc<dyn StateStore>,
        tombstones: Arc<dyn TombstoneWriter>,
        provisioner: Arc<dyn BucketProvisioner>,
        config: &BucketConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            state: Mutex::new(state),
            coordinator: WriteCoordinator::new(config),
            store,
            tombstones,
            provisioner,
        })
    }

    /// This bucket's identity.
    pub fn id(&self) -> BucketId {
        self.id
    }

    /// Whether lookups are currently served.
    pub fn is_available(&self) -> bool {
        self.state.lock().status == IndexStatus::Available
    }

    /// Current availability status.
    pub fn status(&self) -> IndexStatus {
        self.state.lock().status
    }

    /// A point-in-time copy of the bucket's state.
    pub fn snapshot(&self) -> BucketState {
        self.state.lock().clone()
    }

    /// Marks the index as being rebuilt, refusing lookups until the builder
    /// catches up again.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Disposed`] if the bucket was already disposed.
    pub fn set_under_construction(&self) -> Result<()> {
        let mut state = self.state.lock();
        if state.status == IndexStatus::Disposed {
            return DisposedSnafu { bucket: self.id }.fail();
        }
        state.status = IndexStatus::UnderConstruction;
        Ok(())
    }

    /// Applies one member update for `entity`, routing to the successor on
    /// overflow and persisting the result.
    #[instrument(skip_all, fields(bucket = %self.id, entity = %entity))]
    pub async fn apply_update(
        &self,
        entity: EntityRef,
        update: MemberUpdate,
        is_unique: bool,
        capacity: CapacityPolicy,
        origin: Option<&str>,
    ) -> Result<()> {
        if let Some(origin) = origin {
            debug!(origin, "applying member update");
        }
        self.apply_update_at(entity, update, is_unique, capacity).await
    }

    fn apply_update_at(
        &self,
        entity: EntityRef,
        update: MemberUpdate,
        is_unique: bool,
        capacity: CapacityPolicy,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let outcome = {
                let mut state = self.state.lock();
                if state.status == IndexStatus::Disposed {
                    return DisposedSnafu { bucket: self.id }.fail();
                }
                apply_member_update(&mut state, entity, &update, is_unique, &capacity)
            };

            match outcome {
                UpdateOutcome::Overflow => {
                    let successor = self.ensure_successor().await?;
                    debug!(successor = %successor.id, "forwarding overflowing update");
                    successor
                        .apply_update_at(entity, update, is_unique, capacity)
                        .await
                }
                UpdateOutcome::Applied { delete_while_unavailable } => {
                    if delete_while_unavailable {
                        if let Some(before) = update.before.as_ref() {
                            recover_after_unavailable_delete(
                                self.id,
                                &self.state,
                                self.tombstones.as_ref(),
                                entity,
                                before,
                            )
                            .await;
                        }
                    }
                    self.persist().await.context(PersistenceSnafu { bucket: self.id })
                }
            }
        })
    }

    /// Applies a batch of member updates, one persistence request for the
    /// whole batch.
    ///
    /// Updates for the same entity are applied in the supplied order; no
    /// ordering holds across entities. Overflowing updates are forwarded to
    /// the successor as a single batch of their own.
    #[instrument(skip_all, fields(bucket = %self.id, entities = updates.len()))]
    pub async fn apply_update_batch(
        &self,
        updates: Vec<(EntityRef, Vec<MemberUpdate>)>,
        is_unique: bool,
        capacity: CapacityPolicy,
        origin: Option<&str>,
    ) -> Result<()> {
        if let Some(origin) = origin {
            debug!(origin, "applying member update batch");
        }
        self.apply_update_batch_at(updates, is_unique, capacity).await
    }

    fn apply_update_batch_at(
        &self,
        updates: Vec<(EntityRef, Vec<MemberUpdate>)>,
        is_unique: bool,
        capacity: CapacityPolicy,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut forwarded: Vec<(EntityRef, Vec<MemberUpdate>)> = Vec::new();
            let mut recoveries: Vec<(EntityRef, IndexKey)> = Vec::new();
            let mut applied_any = false;
            {
                let mut state = self.state.lock();
                if state.status == IndexStatus::Disposed {
                    return DisposedSnafu { bucket: self.id }.fail();
                }
                for (entity, entity_updates) in updates {
                    let mut overflowed: Vec<MemberUpdate> = Vec::new();
                    let mut remaining = entity_updates.into_iter();
                    while let Some(update) = remaining.next() {
                        match apply_member_update(&mut state, entity, &update, is_unique, &capacity)
                        {
                            UpdateOutcome::Overflow => {
                                // Once an entity's update moves to the
                                // successor, every later update for that
                                // entity must follow it there, or the
                                // per-entity order is lost.
                                overflowed.push(update);
                                overflowed.extend(remaining);
                                break;
                            }
                            UpdateOutcome::Applied { delete_while_unavailable } => {
                                applied_any = true;
                                if delete_while_unavailable {
                                    if let Some(before) = update.before.clone() {
                                        recoveries.push((entity, before));
                                    }
                                }
                            }
                        }
                    }
                    if !overflowed.is_empty() {
                        forwarded.push((entity, overflowed));
                    }
                }
            }

            for (entity, before) in recoveries {
                recover_after_unavailable_delete(
                    self.id,
                    &self.state,
                    self.tombstones.as_ref(),
                    entity,
                    &before,
                )
                .await;
            }

            if !forwarded.is_empty() {
                let successor = self.ensure_successor().await?;
                debug!(
                    successor = %successor.id,
                    entities = forwarded.len(),
                    "forwarding overflowing batch"
                );
                successor
                    .apply_update_batch_at(forwarded, is_unique, capacity)
                    .await?;
            }

            if applied_any {
                self.persist().await.context(PersistenceSnafu { bucket: self.id })?;
            }
            Ok(())
        })
    }

    /// Returns every entity matching `key`, traversing the chain on miss.
    ///
    /// # Errors
    ///
    /// Fails with [`IndexError::Unavailable`] while the index is still
    /// being built and [`IndexError::Disposed`] after disposal.
    pub async fn lookup(&self, key: &IndexKey) -> Result<Vec<EntityRef>> {
        self.lookup_at(key).await
    }

    fn lookup_at<'a>(&'a self, key: &'a IndexKey) -> BoxFuture<'a, Result<Vec<EntityRef>>> {
        Box::pin(async move {
            match self.select(key)? {
                Selection::Found { values, .. } => Ok(values),
                Selection::Delegate(next) => {
                    let successor = self.open_successor(next).await?;
                    successor.lookup_at(key).await
                }
                Selection::Missing => Ok(Vec::new()),
            }
        })
    }

    /// Streams the entities matching `key` into `sink`.
    ///
    /// Pushes one [`LookupEvent::Batch`] from the bucket that resolves the
    /// key, then exactly one [`LookupEvent::Complete`] for the whole chain.
    pub async fn lookup_streamed(&self, key: &IndexKey, sink: ResultSink) -> Result<()> {
        self.lookup_streamed_at(key, sink).await
    }

    fn lookup_streamed_at<'a>(
        &'a self,
        key: &'a IndexKey,
        sink: ResultSink,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            match self.select(key)? {
                Selection::Found { values, .. } => {
                    self.push(key, &sink, LookupEvent::Batch(values)).await?;
                    self.push(key, &sink, LookupEvent::Complete).await
                }
                Selection::Delegate(next) => {
                    let successor = self.open_successor(next).await?;
                    successor.lookup_streamed_at(key, sink).await
                }
                Selection::Missing => self.push(key, &sink, LookupEvent::Complete).await,
            }
        })
    }

    /// Returns the single entity matching `key`.
    ///
    /// # Errors
    ///
    /// Fails with [`IndexError::UniquenessViolation`] if the key matches
    /// more than one entity and [`IndexError::KeyNotFound`] if it matches
    /// none anywhere in the chain.
    pub async fn lookup_unique(&self, key: &IndexKey) -> Result<EntityRef> {
        self.lookup_unique_at(key).await
    }

    fn lookup_unique_at<'a>(&'a self, key: &'a IndexKey) -> BoxFuture<'a, Result<EntityRef>> {
        Box::pin(async move {
            match self.select(key)? {
                Selection::Found { values, next } => match values.as_slice() {
                    [entity] => Ok(*entity),
                    [] => match next {
                        // An entry drained by deletes does not answer for
                        // the rest of the chain.
                        Some(next) => {
                            let successor = self.open_successor(next).await?;
                            successor.lookup_unique_at(key).await
                        }
                        None => KeyNotFoundSnafu { key: key.clone() }.fail(),
                    },
                    found => UniquenessViolationSnafu { key: key.clone(), found: found.len() }
                        .fail(),
                },
                Selection::Delegate(next) => {
                    let successor = self.open_successor(next).await?;
                    successor.lookup_unique_at(key).await
                }
                Selection::Missing => KeyNotFoundSnafu { key: key.clone() }.fail(),
            }
        })
    }

    /// Disposes the bucket: clears entries, persists the terminal state,
    /// and releases the activation.
    pub async fn dispose(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            state.status = IndexStatus::Disposed;
            state.entries.clear();
        }
        info!(bucket = %self.id, "index bucket disposed");
        self.persist().await.context(PersistenceSnafu { bucket: self.id })?;
        self.provisioner.retire(self.id);
        Ok(())
    }

    /// Resolves `key` against this bucket only.
    fn select(&self, key: &IndexKey) -> Result<Selection> {
        let state = self.state.lock();
        match state.status {
            IndexStatus::Disposed => return DisposedSnafu { bucket: self.id }.fail(),
            IndexStatus::UnderConstruction => {
                return UnavailableSnafu { bucket: self.id }.fail()
            }
            IndexStatus::Available => {}
        }
        match state.entries.get(key) {
            Some(entry) if !entry.tentative => {
                let mut values: Vec<_> = entry.values.iter().copied().collect();
                values.sort_unstable();
                Ok(Selection::Found { values, next: state.next })
            }
            _ => match state.next {
                Some(next) => Ok(Selection::Delegate(next)),
                None => Ok(Selection::Missing),
            },
        }
    }

    async fn push(&self, key: &IndexKey, sink: &ResultSink, event: LookupEvent) -> Result<()> {
        sink.send(event)
            .await
            .map_err(|_| IndexError::SinkClosed { key: key.clone() })
    }

    /// Durably records the current state through the write coordinator.
    pub(crate) async fn persist(&self) -> Result<(), CommitError> {
        self.coordinator
            .commit(|| {
                // Snapshot under the lock so a combined write carries every
                // mutation applied before this attempt.
                let payload = {
                    let state = self.state.lock();
                    encode(&*state)
                };
                async move {
                    let payload = payload.context(EncodeSnafu)?;
                    self.store
                        .write_state(self.id, payload)
                        .await
                        .context(StoreSnafu)
                }
            })
            .await
    }
}

impl std::fmt::Debug for IndexBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexBucket")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
