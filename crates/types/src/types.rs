//! Core type definitions for chaindex.
//!
//! Identifier newtypes, index keys, member-update descriptors, and the
//! bucket availability status enum shared by every crate in the workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Identifier Types
// ============================================================================

/// Generates a newtype wrapper around a numeric type for type-safe identifiers.
///
/// Each generated type provides:
/// - Standard derives: Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord
/// - Serde with `#[serde(transparent)]` for wire format compatibility
/// - `From<inner>` and `Into<inner>` conversions
/// - `Display` with a semantic prefix (e.g., `bucket:3`)
/// - `new()` constructor and `value()` accessor
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident, $inner:ty, $prefix:expr
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name($inner);

        impl $name {
            /// Creates a new identifier from a raw value.
            #[inline]
            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            /// Returns the raw numeric value.
            #[inline]
            pub const fn value(self) -> $inner {
                self.0
            }
        }

        impl From<$inner> for $name {
            #[inline]
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl From<$name> for $inner {
            #[inline]
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}:{}", $prefix, self.0)
            }
        }
    };
}

define_id!(
    /// Reference to an indexed entity, by identity rather than by value.
    ///
    /// The surrounding actor runtime owns entity addressing; this is the
    /// opaque handle an index bucket stores for each matching entity.
    ///
    /// # Display
    ///
    /// Formats with `entity:` prefix: `entity:42`.
    EntityRef, u64, "entity"
);

define_id!(
    /// Stable identity of one bucket in an index chain.
    ///
    /// Buckets may be relocated or recreated independently, so chain links
    /// are recorded as identities resolvable through the provisioning
    /// collaborator, never as in-process pointers.
    ///
    /// # Display
    ///
    /// Formats with `bucket:` prefix: `bucket:7`.
    BucketId, u64, "bucket"
);

// ============================================================================
// Index Keys
// ============================================================================

/// A single key value of a hash index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IndexKey(String);

impl IndexKey {
    /// Creates a key from any string-like value.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for IndexKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for IndexKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Availability
// ============================================================================

/// Availability of one index bucket.
///
/// Transitions are monotonic: `UnderConstruction -> Available -> Disposed`,
/// except that an external rebuild may move an `Available` bucket back to
/// `UnderConstruction`. `Disposed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexStatus {
    /// The index builder has not yet caught up; lookups are refused.
    UnderConstruction,
    /// Fully built; lookups are served.
    Available,
    /// Terminal. Entries are cleared and no further operation is valid.
    Disposed,
}

// ============================================================================
// Member Updates
// ============================================================================

/// The kind of change a member update describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateKind {
    /// The entity newly matches a key.
    Insert,
    /// The entity's key value changed.
    Update,
    /// The entity no longer matches any key.
    Delete,
}

/// One change to an entity's indexed property.
///
/// Carries the key value before the change (the before-image) and after the
/// change (the after-image) where applicable: inserts have only an
/// after-image, deletes only a before-image, updates both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberUpdate {
    /// The operation kind.
    pub kind: UpdateKind,
    /// Key value before the change.
    pub before: Option<IndexKey>,
    /// Key value after the change.
    pub after: Option<IndexKey>,
}

impl MemberUpdate {
    /// An insert of the entity under `key`.
    pub fn insert(key: impl Into<IndexKey>) -> Self {
        Self { kind: UpdateKind::Insert, before: None, after: Some(key.into()) }
    }

    /// A move of the entity from `before` to `after`.
    pub fn update(before: impl Into<IndexKey>, after: impl Into<IndexKey>) -> Self {
        Self { kind: UpdateKind::Update, before: Some(before.into()), after: Some(after.into()) }
    }

    /// A delete of the entity from `key`.
    pub fn delete(key: impl Into<IndexKey>) -> Self {
        Self { kind: UpdateKind::Delete, before: Some(key.into()), after: None }
    }
}

// ============================================================================
// Capacity
// ============================================================================

/// Bound on the number of *distinct keys* one bucket may hold.
///
/// Growth of an existing key's entry never counts against the bound; only
/// inserting a new key can overflow a bucket into its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityPolicy {
    /// Maximum distinct keys per bucket, or `None` for unbounded.
    pub max_keys: Option<usize>,
}

impl CapacityPolicy {
    /// No bound; the bucket never chains.
    pub const fn unbounded() -> Self {
        Self { max_keys: None }
    }

    /// At most `max_keys` distinct keys per bucket.
    pub const fn limited(max_keys: usize) -> Self {
        Self { max_keys: Some(max_keys) }
    }

    /// Whether a bucket already holding `distinct_keys` keys is full.
    pub fn is_full(&self, distinct_keys: usize) -> bool {
        self.max_keys.is_some_and(|max| distinct_keys >= max)
    }
}

impl Default for CapacityPolicy {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_prefixes() {
        assert_eq!(EntityRef::new(42).to_string(), "entity:42");
        assert_eq!(BucketId::new(7).to_string(), "bucket:7");
    }

    #[test]
    fn test_id_conversions() {
        let entity = EntityRef::from(9u64);
        assert_eq!(entity.value(), 9);
        let raw: u64 = entity.into();
        assert_eq!(raw, 9);
    }

    #[test]
    fn test_index_key_equality_and_display() {
        let a = IndexKey::from("location");
        let b = IndexKey::new("location".to_string());
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "location");
        assert_eq!(a.as_str(), "location");
    }

    #[test]
    fn test_member_update_constructors() {
        let insert = MemberUpdate::insert("a");
        assert_eq!(insert.kind, UpdateKind::Insert);
        assert_eq!(insert.before, None);
        assert_eq!(insert.after, Some(IndexKey::from("a")));

        let update = MemberUpdate::update("a", "b");
        assert_eq!(update.kind, UpdateKind::Update);
        assert_eq!(update.before, Some(IndexKey::from("a")));
        assert_eq!(update.after, Some(IndexKey::from("b")));

        let delete = MemberUpdate::delete("a");
        assert_eq!(delete.kind, UpdateKind::Delete);
        assert_eq!(delete.before, Some(IndexKey::from("a")));
        assert_eq!(delete.after, None);
    }

    #[test]
    fn test_capacity_policy() {
        let unbounded = CapacityPolicy::unbounded();
        assert!(!unbounded.is_full(usize::MAX));

        let limited = CapacityPolicy::limited(2);
        assert!(!limited.is_full(0));
        assert!(!limited.is_full(1));
        assert!(limited.is_full(2));
        assert!(limited.is_full(3));
    }
}
