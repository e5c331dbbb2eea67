//! The update engine: applies member updates to bucket state.
//!
//! Pure and synchronous. The caller decides what to do with an
//! [`UpdateOutcome::Overflow`] (chain to a successor) and with the
//! delete-while-unavailable flag (tombstone recovery); nothing here
//! suspends or performs I/O.

use chaindex_types::{CapacityPolicy, EntityRef, IndexKey, IndexStatus, MemberUpdate, UpdateKind};
use tracing::debug;

use crate::state::{BucketEntry, BucketState};

/// Result of applying one member update to a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The update was applied to this bucket's state.
    Applied {
        /// A delete was applied while the bucket was not `Available`.
        /// The caller must run tombstone recovery.
        delete_while_unavailable: bool,
    },
    /// The update would insert a new key into a full bucket. State is
    /// untouched; the caller must forward the exact same update to the
    /// successor bucket.
    Overflow,
}

impl UpdateOutcome {
    const APPLIED: Self = Self::Applied { delete_while_unavailable: false };
}

/// Applies `update` for `entity` to `state`.
///
/// The affected key is taken from the after-image for inserts and updates
/// and from the before-image for deletes. A malformed update (missing the
/// image its kind requires) is a caller precondition violation and is
/// applied as a no-op.
///
/// `is_unique` is advisory at this layer: duplicate keys of a unique index
/// are not rejected here; uniqueness is enforced at read time.
pub fn apply_member_update(
    state: &mut BucketState,
    entity: EntityRef,
    update: &MemberUpdate,
    is_unique: bool,
    capacity: &CapacityPolicy,
) -> UpdateOutcome {
    match update.kind {
        UpdateKind::Insert => {
            let Some(key) = update.after.as_ref() else {
                return UpdateOutcome::APPLIED;
            };
            insert_value(state, key, entity, is_unique, capacity)
        }
        UpdateKind::Update => {
            let (Some(before), Some(after)) = (update.before.as_ref(), update.after.as_ref())
            else {
                return UpdateOutcome::APPLIED;
            };
            if before == after {
                return UpdateOutcome::APPLIED;
            }
            // Check overflow before touching the before-image entry so an
            // overflowing update leaves this bucket unchanged.
            if state.entries.would_overflow(after, capacity) {
                return UpdateOutcome::Overflow;
            }
            if let Some(entry) = state.entries.get_mut(before) {
                entry.values.remove(&entity);
            }
            insert_value(state, after, entity, is_unique, capacity)
        }
        UpdateKind::Delete => {
            let Some(key) = update.before.as_ref() else {
                return UpdateOutcome::APPLIED;
            };
            if let Some(entry) = state.entries.get_mut(key) {
                entry.values.remove(&entity);
            }
            UpdateOutcome::Applied {
                delete_while_unavailable: state.status != IndexStatus::Available,
            }
        }
    }
}

fn insert_value(
    state: &mut BucketState,
    key: &IndexKey,
    entity: EntityRef,
    is_unique: bool,
    capacity: &CapacityPolicy,
) -> UpdateOutcome {
    if state.entries.would_overflow(key, capacity) {
        return UpdateOutcome::Overflow;
    }
    match state.entries.get_mut(key) {
        Some(entry) => {
            entry.values.insert(entity);
            if is_unique && entry.values.len() > 1 {
                debug!(%key, values = entry.values.len(), "unique index key holds multiple entities");
            }
        }
        None => state.entries.put(key.clone(), BucketEntry::of(entity)),
    }
    UpdateOutcome::APPLIED
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    const UNBOUNDED: CapacityPolicy = CapacityPolicy::unbounded();

    fn key(s: &str) -> IndexKey {
        IndexKey::from(s)
    }

    fn entities(state: &BucketState, k: &str) -> Vec<EntityRef> {
        let mut values: Vec<_> = state
            .entries
            .get(&key(k))
            .map(|e| e.values.iter().copied().collect())
            .unwrap_or_default();
        values.sort_unstable();
        values
    }

    #[test]
    fn test_insert_creates_entry() {
        let mut state = BucketState::new();
        let outcome = apply_member_update(
            &mut state,
            EntityRef::new(1),
            &MemberUpdate::insert("a"),
            false,
            &UNBOUNDED,
        );
        assert_eq!(outcome, UpdateOutcome::APPLIED);
        assert_eq!(entities(&state, "a"), vec![EntityRef::new(1)]);
    }

    #[test]
    fn test_insert_extends_existing_entry() {
        let mut state = BucketState::new();
        for id in 1..=2 {
            apply_member_update(
                &mut state,
                EntityRef::new(id),
                &MemberUpdate::insert("a"),
                false,
                &UNBOUNDED,
            );
        }
        assert_eq!(entities(&state, "a"), vec![EntityRef::new(1), EntityRef::new(2)]);
        assert_eq!(state.entries.len(), 1);
    }

    #[test]
    fn test_insert_new_key_at_capacity_overflows_without_mutation() {
        let mut state = BucketState::new();
        let capacity = CapacityPolicy::limited(1);
        apply_member_update(
            &mut state,
            EntityRef::new(1),
            &MemberUpdate::insert("a"),
            false,
            &capacity,
        );

        let outcome = apply_member_update(
            &mut state,
            EntityRef::new(2),
            &MemberUpdate::insert("b"),
            false,
            &capacity,
        );
        assert_eq!(outcome, UpdateOutcome::Overflow);
        assert_eq!(state.entries.len(), 1);
        assert!(state.entries.get(&key("b")).is_none());
    }

    #[test]
    fn test_insert_existing_key_at_capacity_applies() {
        let mut state = BucketState::new();
        let capacity = CapacityPolicy::limited(1);
        apply_member_update(
            &mut state,
            EntityRef::new(1),
            &MemberUpdate::insert("a"),
            false,
            &capacity,
        );

        let outcome = apply_member_update(
            &mut state,
            EntityRef::new(2),
            &MemberUpdate::insert("a"),
            false,
            &capacity,
        );
        assert_eq!(outcome, UpdateOutcome::APPLIED);
        assert_eq!(entities(&state, "a").len(), 2);
    }

    #[test]
    fn test_update_moves_entity_between_keys() {
        let mut state = BucketState::new();
        apply_member_update(
            &mut state,
            EntityRef::new(1),
            &MemberUpdate::insert("a"),
            false,
            &UNBOUNDED,
        );

        let outcome = apply_member_update(
            &mut state,
            EntityRef::new(1),
            &MemberUpdate::update("a", "b"),
            false,
            &UNBOUNDED,
        );
        assert_eq!(outcome, UpdateOutcome::APPLIED);
        assert!(entities(&state, "a").is_empty());
        assert_eq!(entities(&state, "b"), vec![EntityRef::new(1)]);
    }

    #[test]
    fn test_update_same_key_is_noop() {
        let mut state = BucketState::new();
        apply_member_update(
            &mut state,
            EntityRef::new(1),
            &MemberUpdate::insert("a"),
            false,
            &UNBOUNDED,
        );

        let outcome = apply_member_update(
            &mut state,
            EntityRef::new(1),
            &MemberUpdate::update("a", "a"),
            false,
            &CapacityPolicy::limited(1),
        );
        assert_eq!(outcome, UpdateOutcome::APPLIED);
        assert_eq!(entities(&state, "a"), vec![EntityRef::new(1)]);
    }

    #[test]
    fn test_update_to_new_key_at_capacity_overflows_keeping_before_image() {
        let mut state = BucketState::new();
        let capacity = CapacityPolicy::limited(1);
        apply_member_update(
            &mut state,
            EntityRef::new(1),
            &MemberUpdate::insert("a"),
            false,
            &capacity,
        );

        let outcome = apply_member_update(
            &mut state,
            EntityRef::new(1),
            &MemberUpdate::update("a", "b"),
            false,
            &capacity,
        );
        assert_eq!(outcome, UpdateOutcome::Overflow);
        // The before-image entry must be untouched: the whole update is
        // forwarded to the successor.
        assert_eq!(entities(&state, "a"), vec![EntityRef::new(1)]);
    }

    #[test]
    fn test_delete_removes_entity() {
        let mut state = BucketState::new();
        apply_member_update(
            &mut state,
            EntityRef::new(1),
            &MemberUpdate::insert("a"),
            false,
            &UNBOUNDED,
        );

        let outcome = apply_member_update(
            &mut state,
            EntityRef::new(1),
            &MemberUpdate::delete("a"),
            false,
            &UNBOUNDED,
        );
        assert_eq!(outcome, UpdateOutcome::Applied { delete_while_unavailable: false });
        assert!(entities(&state, "a").is_empty());
    }

    #[test]
    fn test_delete_while_under_construction_flags_recovery() {
        let mut state = BucketState::new();
        state.status = IndexStatus::UnderConstruction;

        // Even a delete of a never-inserted entity flags recovery: its
        // omission from an under-construction index is unsafe to ignore.
        let outcome = apply_member_update(
            &mut state,
            EntityRef::new(1),
            &MemberUpdate::delete("x"),
            false,
            &UNBOUNDED,
        );
        assert_eq!(outcome, UpdateOutcome::Applied { delete_while_unavailable: true });
    }

    #[test]
    fn test_delete_never_overflows() {
        let mut state = BucketState::new();
        let capacity = CapacityPolicy::limited(0);
        let outcome = apply_member_update(
            &mut state,
            EntityRef::new(1),
            &MemberUpdate::delete("x"),
            false,
            &capacity,
        );
        assert!(matches!(outcome, UpdateOutcome::Applied { .. }));
    }

    #[test]
    fn test_unique_flag_does_not_reject_duplicates() {
        let mut state = BucketState::new();
        for id in 1..=2 {
            let outcome = apply_member_update(
                &mut state,
                EntityRef::new(id),
                &MemberUpdate::insert("a"),
                true,
                &UNBOUNDED,
            );
            assert_eq!(outcome, UpdateOutcome::APPLIED);
        }
        assert_eq!(entities(&state, "a").len(), 2);
    }
}
