//! Error taxonomy for the bucket engine.

use chaindex_types::{BucketId, IndexKey};
use snafu::Snafu;

use crate::persistence::CommitError;

/// Errors surfaced by bucket operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum IndexError {
    /// A lookup was attempted while the index is not `Available`.
    #[snafu(display("index bucket {bucket} is not available for lookups"))]
    Unavailable {
        /// The bucket that refused the lookup.
        bucket: BucketId,
    },

    /// The bucket has been disposed and accepts no further operations.
    #[snafu(display("index bucket {bucket} is disposed"))]
    Disposed {
        /// The disposed bucket.
        bucket: BucketId,
    },

    /// A unique lookup found more than one entity for the key.
    #[snafu(display("unique index key {key} matches {found} entities"))]
    UniquenessViolation {
        /// The offending key.
        key: IndexKey,
        /// Number of entities found.
        found: usize,
    },

    /// A unique lookup found no entity for the key anywhere in the chain.
    #[snafu(display("no entity matches index key {key}"))]
    KeyNotFound {
        /// The key that was looked up.
        key: IndexKey,
    },

    /// An applied update could not be made durable.
    #[snafu(display("index bucket {bucket} failed to persist: {source}"))]
    Persistence {
        /// The bucket whose write failed.
        bucket: BucketId,
        /// The commit failure.
        source: CommitError,
    },

    /// A chained bucket could not be opened.
    #[snafu(display("successor bucket {bucket} could not be opened: {source}"))]
    SuccessorUnavailable {
        /// The successor that failed to open.
        bucket: BucketId,
        /// The provisioning failure.
        source: chaindex_store::Error,
    },

    /// A streaming lookup's receiver hung up before the stream completed.
    #[snafu(display("lookup result sink closed while streaming key {key}"))]
    SinkClosed {
        /// The key being streamed.
        key: IndexKey,
    },
}

/// Convenience alias used throughout the engine.
pub type Result<T, E = IndexError> = std::result::Result<T, E>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_key_and_cardinality() {
        let err = IndexError::UniquenessViolation { key: IndexKey::from("alice"), found: 2 };
        assert_eq!(err.to_string(), "unique index key alice matches 2 entities");
    }

    #[test]
    fn test_display_includes_bucket_id() {
        let err = IndexError::Disposed { bucket: BucketId::new(7) };
        assert!(err.to_string().contains("bucket:7"));
    }
}
