//! Static registry of indexed properties.
//!
//! Declares which entity-type properties are indexed and with what
//! configuration. The registry is populated explicitly at process start and
//! frozen afterwards; discovery never happens at call time.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::CapacityPolicy;

/// The property of an entity type that an index covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexedProperty {
    /// Name of the entity type (e.g. `Player`).
    pub entity_type: String,
    /// Name of the indexed property (e.g. `location`).
    pub property: String,
}

impl IndexedProperty {
    /// Creates a property reference.
    pub fn new(entity_type: impl Into<String>, property: impl Into<String>) -> Self {
        Self { entity_type: entity_type.into(), property: property.into() }
    }
}

impl fmt::Display for IndexedProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.entity_type, self.property)
    }
}

/// How one indexed property is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Whether unique-lookup callers may expect exactly one entity per key.
    ///
    /// Advisory at update time: buckets do not reject duplicate keys for
    /// unique indexes; uniqueness is enforced at read time.
    pub unique: bool,
    /// Distinct-key bound threaded into every bucket of this index.
    pub capacity: CapacityPolicy,
}

/// Immutable map from indexed property to its definition.
///
/// Built once at startup via [`IndexRegistry::builder`].
#[derive(Debug, Clone, Default)]
pub struct IndexRegistry {
    definitions: HashMap<IndexedProperty, IndexDefinition>,
}

impl IndexRegistry {
    /// Starts building a registry.
    pub fn builder() -> IndexRegistryBuilder {
        IndexRegistryBuilder::default()
    }

    /// Returns the definition for a property, if it is indexed.
    pub fn get(&self, entity_type: &str, property: &str) -> Option<&IndexDefinition> {
        self.definitions.get(&IndexedProperty::new(entity_type, property))
    }

    /// Number of registered indexes.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether no indexes are registered.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Iterates over all registered properties and their definitions.
    pub fn iter(&self) -> impl Iterator<Item = (&IndexedProperty, &IndexDefinition)> {
        self.definitions.iter()
    }
}

/// Builder for [`IndexRegistry`]. Later registrations of the same property
/// replace earlier ones.
#[derive(Debug, Default)]
pub struct IndexRegistryBuilder {
    definitions: HashMap<IndexedProperty, IndexDefinition>,
}

impl IndexRegistryBuilder {
    /// Registers an indexed property.
    pub fn define(
        mut self,
        entity_type: impl Into<String>,
        property: impl Into<String>,
        definition: IndexDefinition,
    ) -> Self {
        self.definitions.insert(IndexedProperty::new(entity_type, property), definition);
        self
    }

    /// Freezes the registry.
    pub fn build(self) -> IndexRegistry {
        IndexRegistry { definitions: self.definitions }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let registry = IndexRegistry::builder()
            .define(
                "Player",
                "location",
                IndexDefinition { unique: false, capacity: CapacityPolicy::limited(128) },
            )
            .define(
                "Player",
                "email",
                IndexDefinition { unique: true, capacity: CapacityPolicy::unbounded() },
            )
            .build();

        assert_eq!(registry.len(), 2);

        let location = registry.get("Player", "location").expect("registered");
        assert!(!location.unique);
        assert_eq!(location.capacity, CapacityPolicy::limited(128));

        let email = registry.get("Player", "email").expect("registered");
        assert!(email.unique);

        assert!(registry.get("Player", "name").is_none());
        assert!(registry.get("Game", "location").is_none());
    }

    #[test]
    fn test_later_registration_replaces() {
        let registry = IndexRegistry::builder()
            .define(
                "Player",
                "location",
                IndexDefinition { unique: false, capacity: CapacityPolicy::unbounded() },
            )
            .define(
                "Player",
                "location",
                IndexDefinition { unique: false, capacity: CapacityPolicy::limited(8) },
            )
            .build();

        assert_eq!(registry.len(), 1);
        let def = registry.get("Player", "location").expect("registered");
        assert_eq!(def.capacity, CapacityPolicy::limited(8));
    }

    #[test]
    fn test_empty_registry() {
        let registry = IndexRegistry::builder().build();
        assert!(registry.is_empty());
        assert!(registry.get("Player", "location").is_none());
    }

    #[test]
    fn test_indexed_property_display() {
        let prop = IndexedProperty::new("Player", "location");
        assert_eq!(prop.to_string(), "Player.location");
    }
}
