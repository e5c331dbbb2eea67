//! Core types for the chaindex bucket engine.
//!
//! This crate provides the foundational types used throughout chaindex:
//! - Identifier newtypes (`EntityRef`, `BucketId`) and the `IndexKey` type
//! - Member-update descriptors applied to index buckets
//! - Capacity policy and index status enums
//! - The index registry mapping indexed properties to their definitions
//! - Centralized postcard serialization
//! - Configuration with validated builders

pub mod codec;
pub mod config;
pub mod registry;
mod types;

// Re-export commonly used types at crate root
pub use codec::{decode, encode, CodecError};
pub use config::{BucketConfig, ConfigError};
pub use registry::{IndexDefinition, IndexRegistry, IndexRegistryBuilder, IndexedProperty};
pub use types::*;
