//! Shared cache of loaded schemas

use crate::model::Schema;
use dashmap::DashMap;
use std::sync::Arc;

/// Registry of immutable schemas, shareable between validator instances
/// running on different threads
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: DashMap<String, Arc<Schema>>,
}

impl SchemaRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema, returning the shared handle
    pub fn register(&self, name: impl Into<String>, schema: Schema) -> Arc<Schema> {
        let schema = Arc::new(schema);
        self.schemas.insert(name.into(), Arc::clone(&schema));
        schema
    }

    /// Get a schema by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Schema>> {
        self.schemas.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Check if a schema exists
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Remove a schema
    pub fn remove(&self, name: &str) -> Option<Arc<Schema>> {
        self.schemas.remove(name).map(|(_, schema)| schema)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
