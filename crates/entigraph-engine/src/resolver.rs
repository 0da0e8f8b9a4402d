use crate::events::EventBus;
use crate::pipeline::Pipeline;
use dashmap::DashMap;
use entigraph_core::{
    DBEvent, Entity, EntigraphError, EntityId, EntityRef, GenerationContext, GenerationProvider,
    Object, Result, StorageProvider,
};
use entigraph_schema::{
    Direction, EntitySchema, Filter, FilterOp, RelationshipSpec, SchemaRegistry,
};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tuning knobs for the resolution engine.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Bound on nested generation through required forward chains; exceeding
    /// it fails fast with a descriptive error instead of looping through an
    /// accidentally cyclic schema.
    pub max_depth: usize,
    /// Cardinality hint for array cascades with no fixed `[n]` count.
    pub default_cascade_count: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: 8,
            default_cascade_count: 3,
        }
    }
}

/// Ancestor context threaded through nested generation.
#[derive(Debug, Clone, Default)]
pub struct ResolveContext {
    pub depth: usize,
    pub instructions: Option<String>,
}

/// Outcome of a relationship-field access.
#[derive(Debug, Clone)]
pub enum Resolution {
    Empty,
    One(Entity),
    Many(Vec<Entity>),
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        matches!(self, Resolution::Empty)
    }

    pub fn first(&self) -> Option<&Entity> {
        match self {
            Resolution::Empty => None,
            Resolution::One(entity) => Some(entity),
            Resolution::Many(entities) => entities.first(),
        }
    }

    pub fn entities(self) -> Vec<Entity> {
        match self {
            Resolution::Empty => Vec::new(),
            Resolution::One(entity) => vec![entity],
            Resolution::Many(entities) => entities,
        }
    }

    fn from_vec(mut entities: Vec<Entity>, array: bool) -> Self {
        if array {
            Resolution::Many(entities)
        } else if entities.is_empty() {
            Resolution::Empty
        } else {
            Resolution::One(entities.remove(0))
        }
    }
}

type SharedGeneration =
    Shared<BoxFuture<'static, std::result::Result<Vec<Entity>, Arc<EntigraphError>>>>;

/// The cascade resolution engine.
///
/// Relationship reads go through [`resolve`](CascadeResolver::resolve): a
/// supplied value is normalized and returned, a backward or fuzzy match links
/// to an existing entity, and a forward-exact miss on a non-optional field
/// generates the target on demand. Concurrent accesses to the same unresolved
/// field share one in-flight generation, keyed by fingerprint.
///
/// Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct CascadeResolver {
    registry: Arc<SchemaRegistry>,
    storage: Arc<dyn StorageProvider>,
    generator: Arc<dyn GenerationProvider>,
    bus: Arc<EventBus>,
    config: Arc<ResolverConfig>,
    in_flight: Arc<DashMap<String, SharedGeneration>>,
}

impl CascadeResolver {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        storage: Arc<dyn StorageProvider>,
        generator: Arc<dyn GenerationProvider>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self::with_config(registry, storage, generator, bus, ResolverConfig::default())
    }

    pub fn with_config(
        registry: Arc<SchemaRegistry>,
        storage: Arc<dyn StorageProvider>,
        generator: Arc<dyn GenerationProvider>,
        bus: Arc<EventBus>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            registry,
            storage,
            generator,
            bus,
            config: Arc::new(config),
            in_flight: Arc::new(DashMap::new()),
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Creates an entity, normalizing supplied relationship values into
    /// references and emitting `entity:created` plus `Type.created`.
    pub async fn create(&self, entity_type: &str, mut data: Object) -> Result<Entity> {
        let schema = self.registry.require(entity_type)?;

        for (name, descriptor) in &schema.fields {
            if let Some(default) = &descriptor.default {
                data.entry(name.clone()).or_insert_with(|| default.clone());
            }
        }

        for (name, descriptor) in &schema.relationships {
            let Some(value) = data.get(name).cloned() else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let Some(spec) = descriptor.relationship() else {
                continue;
            };
            let normalized = self
                .normalize_supplied(&value, spec, descriptor.modifiers.array)
                .await?;
            data.insert(name.clone(), normalized);
        }

        let entity = self.storage.create(entity_type, data).await?;
        self.emit_lifecycle("created", &entity).await;
        Ok(entity)
    }

    pub async fn get(&self, entity_type: &str, id: EntityId) -> Result<Option<Entity>> {
        self.storage.get(entity_type, id).await
    }

    /// Pipelined read; dedup and event semantics are identical to `get`.
    pub fn get_pipelined(&self, entity_type: &str, id: EntityId) -> Pipeline<Option<Entity>> {
        let storage = Arc::clone(&self.storage);
        let entity_type = entity_type.to_string();
        Pipeline::new(async move { storage.get(&entity_type, id).await })
    }

    pub async fn update(&self, entity_type: &str, id: EntityId, data: Object) -> Result<Entity> {
        let entity = self.storage.update(entity_type, id, data).await?;
        self.emit_lifecycle("updated", &entity).await;
        Ok(entity)
    }

    pub async fn delete(&self, entity_type: &str, id: EntityId) -> Result<bool> {
        let existing = self.storage.get(entity_type, id).await?;
        let deleted = self.storage.delete(entity_type, id).await?;
        if deleted {
            if let Some(entity) = existing {
                self.emit_lifecycle("deleted", &entity).await;
            }
        }
        Ok(deleted)
    }

    /// Resolves one relationship field, generating the target on demand for
    /// forward-exact misses. Optional fields resolve empty instead.
    pub async fn resolve(&self, entity: &Entity, field: &str) -> Result<Resolution> {
        self.resolve_with_context(entity, field, ResolveContext::default(), false)
            .await
    }

    /// Like [`resolve`](CascadeResolver::resolve) but generates even when the
    /// field is optional (the "optional field explicitly requested" case).
    pub async fn resolve_forced(&self, entity: &Entity, field: &str) -> Result<Resolution> {
        self.resolve_with_context(entity, field, ResolveContext::default(), true)
            .await
    }

    pub fn resolve_with_context<'a>(
        &'a self,
        entity: &'a Entity,
        field: &'a str,
        ctx: ResolveContext,
        forced: bool,
    ) -> BoxFuture<'a, Result<Resolution>> {
        Box::pin(self.resolve_inner(entity, field, ctx, forced))
    }

    async fn resolve_inner(
        &self,
        entity: &Entity,
        field: &str,
        ctx: ResolveContext,
        forced: bool,
    ) -> Result<Resolution> {
        let schema = self.registry.require(&entity.entity_type)?;
        let descriptor = schema.relationship_field(field).ok_or_else(|| {
            EntigraphError::InvalidOperation(format!(
                "{}.{} is not a relationship field",
                entity.entity_type, field
            ))
        })?;
        let spec = descriptor.relationship().ok_or_else(|| {
            EntigraphError::InvalidOperation(format!(
                "{}.{} is not a relationship field",
                entity.entity_type, field
            ))
        })?;
        let array = descriptor.modifiers.array;

        // Re-read the owner so a previous resolution (possibly by another
        // task) is observed instead of regenerated.
        let owner = self
            .storage
            .get(&entity.entity_type, entity.id)
            .await?
            .unwrap_or_else(|| entity.clone());

        // Supplied: a value present on the instance wins; no generation.
        if let Some(value) = owner.field(field) {
            if !value.is_null() {
                let entities = self.fetch_refs(value, &spec.target).await?;
                let resolution = Resolution::from_vec(entities, array);
                self.emit_complete(&owner, field, &resolution).await;
                return Ok(resolution);
            }
        }

        // Linked: backward relationships collect existing entities that point
        // at the owner; they never generate.
        if spec.direction() == Direction::Backward {
            let entities = self.find_backrefs(&owner, &schema, spec).await?;
            let resolution = Resolution::from_vec(entities, array);
            self.emit_complete(&owner, field, &resolution).await;
            return Ok(resolution);
        }

        // Linked: fuzzy relationships try a similarity lookup first.
        if spec.is_fuzzy() {
            let matches = self.find_fuzzy(spec).await?;
            if !matches.is_empty() {
                debug!(
                    entity = %owner.entity_type,
                    field,
                    "fuzzy lookup linked existing target"
                );
                let resolution = Resolution::from_vec(matches, array);
                self.emit_complete(&owner, field, &resolution).await;
                return Ok(resolution);
            }
        }

        // Optional fields resolve empty rather than generating.
        if descriptor.modifiers.optional && !forced {
            let resolution = Resolution::Empty;
            self.emit_complete(&owner, field, &resolution).await;
            return Ok(resolution);
        }

        if ctx.depth >= self.config.max_depth {
            warn!(
                entity = %owner.entity_type,
                field,
                depth = ctx.depth,
                "resolve depth exceeded; schema is cyclic through required relationships"
            );
            return Err(EntigraphError::DepthExceeded {
                entity: owner.entity_type.clone(),
                field: field.to_string(),
                depth: ctx.depth,
            });
        }

        let entities = self.generate(&owner, field, spec, array, &ctx).await?;
        Ok(Resolution::from_vec(entities, array))
    }

    /// Generation with at-most-one-in-flight dedup per fingerprint.
    async fn generate(
        &self,
        owner: &Entity,
        field: &str,
        spec: &RelationshipSpec,
        array: bool,
        ctx: &ResolveContext,
    ) -> Result<Vec<Entity>> {
        let instructions = ctx.instructions.clone().or_else(|| {
            owner
                .field("$instructions")
                .and_then(Value::as_str)
                .map(str::to_string)
        });
        let context = GenerationContext {
            owner_type: owner.entity_type.clone(),
            owner_id: Some(owner.id),
            field: field.to_string(),
            target_type: spec.target.clone(),
            prompt: spec.prompt.clone(),
            owner_data: owner.data.clone(),
            instructions,
            depth: ctx.depth,
        };
        let count = if array {
            Some(spec.count.unwrap_or(self.config.default_cascade_count))
        } else {
            Some(1)
        };

        let fingerprint = fingerprint(owner, field, &context)?;
        let shared = match self.in_flight.entry(fingerprint.clone()) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                debug!(%fingerprint, "joining in-flight generation");
                entry.get().clone()
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                info!(
                    owner = %owner.entity_type,
                    field,
                    target = %spec.target,
                    depth = ctx.depth,
                    "starting generation"
                );
                let future = generation_task(
                    self.clone(),
                    owner.clone(),
                    field.to_string(),
                    context,
                    count,
                    array,
                )
                .boxed()
                .shared();
                entry.insert(future.clone());
                future
            }
        };

        let outcome = shared.await;
        // Clear the registry entry whether the attempt resolved or failed so
        // a later access can retry.
        self.in_flight.remove(&fingerprint);

        outcome.map_err(|err| EntigraphError::Generation {
            entity: owner.entity_type.clone(),
            field: field.to_string(),
            reason: err.to_string(),
        })
    }

    async fn normalize_supplied(
        &self,
        value: &Value,
        spec: &RelationshipSpec,
        array: bool,
    ) -> Result<Value> {
        match value {
            Value::Array(items) => {
                let mut refs = Vec::with_capacity(items.len());
                for item in items {
                    refs.push(self.normalize_one(item, spec).await?);
                }
                Ok(Value::Array(refs))
            }
            _ if array => {
                let single = self.normalize_one(value, spec).await?;
                Ok(Value::Array(vec![single]))
            }
            _ => self.normalize_one(value, spec).await,
        }
    }

    async fn normalize_one(&self, value: &Value, spec: &RelationshipSpec) -> Result<Value> {
        if let Some(reference) = EntityRef::from_value(value, &spec.target) {
            return Ok(reference.to_value());
        }
        // An inline object is created as the target and replaced by its ref.
        if let Value::Object(data) = value {
            let entity = self.storage.create(&spec.target, data.clone()).await?;
            self.emit_lifecycle("created", &entity).await;
            return Ok(entity.reference().to_value());
        }
        Err(EntigraphError::InvalidOperation(format!(
            "cannot normalize {value} into a {} reference",
            spec.target
        )))
    }

    async fn fetch_refs(&self, value: &Value, target: &str) -> Result<Vec<Entity>> {
        let refs: Vec<EntityRef> = match value {
            Value::Array(items) => items
                .iter()
                .filter_map(|item| EntityRef::from_value(item, target))
                .collect(),
            other => EntityRef::from_value(other, target).into_iter().collect(),
        };
        let mut entities = Vec::with_capacity(refs.len());
        for reference in refs {
            if let Some(entity) = self
                .storage
                .get(&reference.entity_type, reference.id)
                .await?
            {
                entities.push(entity);
            }
        }
        Ok(entities)
    }

    async fn find_backrefs(
        &self,
        owner: &Entity,
        schema: &EntitySchema,
        spec: &RelationshipSpec,
    ) -> Result<Vec<Entity>> {
        let backref = spec
            .backref
            .as_deref()
            .unwrap_or(&schema.singular)
            .to_string();
        let mut filter = Object::new();
        filter.insert(backref.clone(), owner.reference().to_value());
        let mut found = self.storage.find(&spec.target, &filter).await?;
        if found.is_empty() {
            // Bare-id storage of the backref field still counts as a match.
            let mut filter = Object::new();
            filter.insert(backref, Value::String(owner.id.to_string()));
            found = self.storage.find(&spec.target, &filter).await?;
        }
        Ok(apply_filters(found, &spec.filters))
    }

    async fn find_fuzzy(&self, spec: &RelationshipSpec) -> Result<Vec<Entity>> {
        let candidates = self.storage.find(&spec.target, &Object::new()).await?;
        Ok(apply_filters(candidates, &spec.filters))
    }

    async fn emit_lifecycle(&self, action: &str, entity: &Entity) {
        // Causal order: the generic event first, then the type-scoped one.
        self.bus
            .emit(
                DBEvent::new(format!("entity:{action}"))
                    .with_object(entity.reference())
                    .with_object_data(entity.data.clone()),
            )
            .await;
        self.bus
            .emit(
                DBEvent::new(format!("{}.{action}", entity.entity_type))
                    .with_object(entity.reference())
                    .with_object_data(entity.data.clone()),
            )
            .await;
    }

    async fn emit_complete(&self, owner: &Entity, field: &str, resolution: &Resolution) {
        let mut meta = Object::new();
        meta.insert("field".to_string(), Value::String(field.to_string()));
        meta.insert(
            "count".to_string(),
            Value::Number(resolution.clone().entities().len().into()),
        );
        let mut event = DBEvent::new("resolve:complete")
            .with_object(owner.reference())
            .with_meta(meta);
        if let Some(first) = resolution.first() {
            event = event.with_result(first.reference());
        }
        self.bus.emit(event).await;
    }

    async fn emit_progress(&self, owner: &Entity, field: &str, current: usize, total: usize) {
        let mut meta = Object::new();
        meta.insert("field".to_string(), Value::String(field.to_string()));
        meta.insert("current".to_string(), Value::Number(current.into()));
        meta.insert("total".to_string(), Value::Number(total.into()));
        self.bus
            .emit(
                DBEvent::new("cascade:progress")
                    .with_object(owner.reference())
                    .with_meta(meta),
            )
            .await;
    }
}

/// The single generation attempt behind a fingerprint. Owns clones of all
/// shared state so concurrent accessors can await it as a `Shared` future.
async fn generation_task(
    resolver: CascadeResolver,
    owner: Entity,
    field: String,
    context: GenerationContext,
    count: Option<usize>,
    array: bool,
) -> std::result::Result<Vec<Entity>, Arc<EntigraphError>> {
    let total = count.unwrap_or(1);
    resolver.emit_progress(&owner, &field, 0, total).await;

    let payloads = resolver
        .generator
        .generate(&context.target_type, &context, count)
        .await
        .map_err(Arc::new)?;

    let total = payloads.len().max(total);
    let mut entities = Vec::with_capacity(payloads.len());
    for (index, payload) in payloads.into_iter().enumerate() {
        let entity = resolver
            .storage
            .create(&context.target_type, payload)
            .await
            .map_err(Arc::new)?;
        resolver.emit_lifecycle("created", &entity).await;
        resolver
            .emit_progress(&owner, &field, index + 1, total)
            .await;
        entities.push(entity);
    }

    // Nested generation: required forward relationships of each generated
    // target cascade with an incremented depth, so cyclic required schemas
    // hit the depth bound instead of looping.
    if let Some(target_schema) = resolver.registry.get(&context.target_type) {
        let nested_ctx = ResolveContext {
            depth: context.depth + 1,
            instructions: context.instructions.clone(),
        };
        for entity in &entities {
            for (nested_field, descriptor) in &target_schema.relationships {
                let Some(spec) = descriptor.relationship() else {
                    continue;
                };
                if spec.direction() != Direction::Forward
                    || spec.is_fuzzy()
                    || !descriptor.modifiers.required
                {
                    continue;
                }
                resolver
                    .resolve_with_context(entity, nested_field, nested_ctx.clone(), false)
                    .await
                    .map_err(Arc::new)?;
            }
        }
    }

    // Link the generated targets back onto the owner.
    let mut refs: Vec<Value> = entities.iter().map(|e| e.reference().to_value()).collect();
    let link = if array || refs.len() != 1 {
        Value::Array(refs)
    } else {
        refs.remove(0)
    };
    let mut update = Object::new();
    update.insert(field.clone(), link);
    resolver
        .storage
        .update(&owner.entity_type, owner.id, update)
        .await
        .map_err(Arc::new)?;

    let resolution = Resolution::from_vec(entities.clone(), array);
    resolver.emit_complete(&owner, &field, &resolution).await;

    Ok(entities)
}

/// Stable key for one (owner, field, context) generation request.
fn fingerprint(owner: &Entity, field: &str, context: &GenerationContext) -> Result<String> {
    let serialized = serde_json::to_string(context)?;
    let mut hasher = Sha256::new();
    hasher.update(owner.entity_type.as_bytes());
    hasher.update(owner.id.as_bytes());
    hasher.update(field.as_bytes());
    hasher.update(serialized.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

fn apply_filters(entities: Vec<Entity>, filters: &[Filter]) -> Vec<Entity> {
    if filters.is_empty() {
        return entities;
    }
    entities
        .into_iter()
        .filter(|entity| {
            filters.iter().all(|filter| {
                entity
                    .field(&filter.field)
                    .map(|value| filter_matches(value, filter))
                    .unwrap_or(false)
            })
        })
        .collect()
}

fn filter_matches(value: &Value, filter: &Filter) -> bool {
    match filter.operator {
        FilterOp::Eq => value == &filter.value,
        FilterOp::Ne => value != &filter.value,
        FilterOp::Gt | FilterOp::Ge | FilterOp::Lt | FilterOp::Le => {
            let (Some(a), Some(b)) = (value.as_f64(), filter.value.as_f64()) else {
                return false;
            };
            match filter.operator {
                FilterOp::Gt => a > b,
                FilterOp::Ge => a >= b,
                FilterOp::Lt => a < b,
                FilterOp::Le => a <= b,
                _ => unreachable!(),
            }
        }
    }
}
