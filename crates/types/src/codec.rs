//! Wire codec for persisted bucket records.
//!
//! Everything a bucket hands to its state store goes through these two
//! functions: the persisted layout of a bucket is the postcard encoding of
//! its state record and nothing else, so stores never parse payloads and
//! the record shape can evolve in one place.

use serde::{de::DeserializeOwned, Serialize};
use snafu::Snafu;

/// A bucket record failed to encode or decode.
#[derive(Debug, Snafu)]
pub enum CodecError {
    /// The record could not be serialized.
    #[snafu(display("record encoding failed: {source}"))]
    Encode {
        /// The underlying postcard error.
        source: postcard::Error,
    },

    /// The stored bytes do not decode as the expected record.
    #[snafu(display("record decoding failed: {source}"))]
    Decode {
        /// The underlying postcard error.
        source: postcard::Error,
    },
}

/// Encodes a record into the bytes handed to the state store.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(value).map_err(|source| CodecError::Encode { source })
}

/// Decodes bytes read back from the state store.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if the bytes are truncated or malformed.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    postcard::from_bytes(bytes).map_err(|source| CodecError::Decode { source })
}
