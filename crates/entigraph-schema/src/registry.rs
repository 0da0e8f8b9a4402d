use crate::builder::{build_schema, EntitySchema};
use dashmap::DashMap;
use entigraph_core::{EntigraphError, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Process-wide schema store, keyed by entity name.
///
/// Explicitly injectable rather than a global so isolated registries can
/// coexist (tests, per-tenant setups). Registration is rare and uses
/// replace-on-write semantics: re-registering a name atomically swaps the
/// schema, and callers must not rely on previously returned instances.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: DashMap<String, Arc<EntitySchema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: &str, definition: &Value) -> Result<Arc<EntitySchema>> {
        let schema = Arc::new(build_schema(name, definition)?);
        let replaced = self.schemas.insert(name.to_string(), schema.clone());
        info!(entity = name, replaced = replaced.is_some(), "registered schema");
        Ok(schema)
    }

    /// Registers every entity type in a `{ Type: definition }` map.
    pub fn register_all(&self, definitions: &Value) -> Result<Vec<Arc<EntitySchema>>> {
        let map = definitions
            .as_object()
            .ok_or_else(|| EntigraphError::InvalidOperation(
                "schema set must be an object keyed by entity name".to_string(),
            ))?;
        map.iter()
            .map(|(name, definition)| self.register(name, definition))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<EntitySchema>> {
        self.schemas.get(name).map(|entry| entry.value().clone())
    }

    pub fn require(&self, name: &str) -> Result<Arc<EntitySchema>> {
        self.get(name)
            .ok_or_else(|| EntigraphError::UnknownEntityType(name.to_string()))
    }

    pub fn all(&self) -> Vec<Arc<EntitySchema>> {
        let mut schemas: Vec<_> = self
            .schemas
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn clear(&self) {
        self.schemas.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn register_and_lookup() {
        let registry = SchemaRegistry::new();
        registry
            .register_all(&json!({
                "Startup": {"idea": "->Idea"},
                "Idea": {"description": "string"}
            }))
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.get("Startup").is_some());
        assert!(registry.get("Missing").is_none());
        assert!(registry.require("Missing").is_err());
    }

    #[test]
    fn re_registration_replaces() {
        let registry = SchemaRegistry::new();
        registry.register("Post", &json!({"title": "string"})).unwrap();
        registry
            .register("Post", &json!({"title": "string", "body": "string"}))
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("Post").unwrap().fields.len(), 2);
    }

    #[test]
    fn clear_empties_the_registry() {
        let registry = SchemaRegistry::new();
        registry.register("Post", &json!({"title": "string"})).unwrap();
        registry.clear();
        assert!(registry.is_empty());
    }
}
