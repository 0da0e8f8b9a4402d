use crate::{Entity, EntityId, GenerationContext, Object, Result};
use async_trait::async_trait;

/// Backing store for entity instances. Implementations may be in-memory or
/// persistent; a missing row is `Ok(None)`, never an error. Genuine
/// transport or server failures surface as `EntigraphError::Storage`.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    async fn create(&self, entity_type: &str, data: Object) -> Result<Entity>;
    async fn get(&self, entity_type: &str, id: EntityId) -> Result<Option<Entity>>;
    async fn find(&self, entity_type: &str, filter: &Object) -> Result<Vec<Entity>>;
    async fn update(&self, entity_type: &str, id: EntityId, data: Object) -> Result<Entity>;
    async fn delete(&self, entity_type: &str, id: EntityId) -> Result<bool>;
}

/// Produces field payloads for entities generated on demand.
///
/// `count` is a hint for array cascades; a provider may return fewer or more
/// when no fixed cardinality was requested. Quota or availability problems
/// surface as provider errors and are never substituted with defaults.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(
        &self,
        target_type: &str,
        context: &GenerationContext,
        count: Option<usize>,
    ) -> Result<Vec<Object>>;

    /// Check if the provider is available and ready.
    async fn is_available(&self) -> bool {
        true
    }

    fn provider_name(&self) -> &str;
}
