use crate::pipeline::Pipeline;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use entigraph_core::{Entity, EntigraphError, EntityId, Object, Result, StorageProvider};
use std::sync::Arc;
use tracing::trace;

/// In-memory storage provider over per-type dashmap tables.
///
/// Missing rows are `Ok(None)` / `Ok(false)`, never errors; `update` on a
/// missing row is the one genuine `NotFound`.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: DashMap<String, DashMap<EntityId, Entity>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, entity_type: &str) -> usize {
        self.tables.get(entity_type).map_or(0, |t| t.len())
    }

    /// Pipelined read: dependent operations can be chained onto the handle
    /// before the lookup is awaited.
    pub fn get_pipelined(
        self: &Arc<Self>,
        entity_type: &str,
        id: EntityId,
    ) -> Pipeline<Option<Entity>> {
        let storage = Arc::clone(self);
        let entity_type = entity_type.to_string();
        Pipeline::new(async move { storage.get(&entity_type, id).await })
    }

    fn matches(entity: &Entity, filter: &Object) -> bool {
        filter
            .iter()
            .all(|(key, expected)| entity.data.get(key) == Some(expected))
    }
}

#[async_trait]
impl StorageProvider for MemoryStorage {
    async fn create(&self, entity_type: &str, data: Object) -> Result<Entity> {
        let entity = Entity::new(entity_type, data);
        trace!(entity_type, id = %entity.id, "create");
        self.tables
            .entry(entity_type.to_string())
            .or_default()
            .insert(entity.id, entity.clone());
        Ok(entity)
    }

    async fn get(&self, entity_type: &str, id: EntityId) -> Result<Option<Entity>> {
        Ok(self
            .tables
            .get(entity_type)
            .and_then(|table| table.get(&id).map(|e| e.clone())))
    }

    async fn find(&self, entity_type: &str, filter: &Object) -> Result<Vec<Entity>> {
        let mut found: Vec<Entity> = self
            .tables
            .get(entity_type)
            .map(|table| {
                table
                    .iter()
                    .filter(|entry| Self::matches(entry.value(), filter))
                    .map(|entry| entry.value().clone())
                    .collect()
            })
            .unwrap_or_default();
        found.sort_by_key(|e| (e.created_at, e.id));
        Ok(found)
    }

    async fn update(&self, entity_type: &str, id: EntityId, data: Object) -> Result<Entity> {
        let table = self
            .tables
            .get(entity_type)
            .ok_or_else(|| EntigraphError::NotFound {
                entity: entity_type.to_string(),
                id: id.to_string(),
            })?;
        let mut entry = table.get_mut(&id).ok_or_else(|| EntigraphError::NotFound {
            entity: entity_type.to_string(),
            id: id.to_string(),
        })?;
        for (key, value) in data {
            entry.data.insert(key, value);
        }
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    async fn delete(&self, entity_type: &str, id: EntityId) -> Result<bool> {
        Ok(self
            .tables
            .get(entity_type)
            .map_or(false, |table| table.remove(&id).is_some()))
    }
}
