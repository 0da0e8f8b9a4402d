use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub type EntityId = Uuid;

/// JSON object form used for entity payloads, filters, and event metadata.
pub type Object = serde_json::Map<String, Value>;

/// A stored entity instance. Payload fields live in `data`; relationship
/// fields hold normalized [`EntityRef`] values (or arrays of them) once
/// resolved or supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub data: Object,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    pub fn new(entity_type: impl Into<String>, data: Object) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            entity_type: entity_type.into(),
            data,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    pub fn reference(&self) -> EntityRef {
        EntityRef {
            entity_type: self.entity_type.clone(),
            id: self.id,
        }
    }
}

/// A typed pointer to an entity, the normalized form of all supplied and
/// generated relationship values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub id: EntityId,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, id: EntityId) -> Self {
        Self {
            entity_type: entity_type.into(),
            id,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Parses a reference out of a stored field value. Accepts the canonical
    /// `{"type": ..., "id": ...}` object form or a bare id string scoped to
    /// `fallback_type`.
    pub fn from_value(value: &Value, fallback_type: &str) -> Option<Self> {
        match value {
            Value::Object(_) => serde_json::from_value(value.clone()).ok(),
            Value::String(s) => Uuid::parse_str(s)
                .ok()
                .map(|id| Self::new(fallback_type, id)),
            _ => None,
        }
    }
}

/// A structured lifecycle event, append-only.
///
/// Event names use dotted `Type.action` form for type-scoped lifecycle events
/// and colon `kind:action` form for engine-level notifications such as
/// `cascade:progress` and `resolve:complete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DBEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<EntityRef>,
    #[serde(rename = "objectData", skip_serializing_if = "Option::is_none")]
    pub object_data: Option<Object>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<EntityRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Object>,
    pub timestamp: DateTime<Utc>,
}

impl DBEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            actor: None,
            event: event.into(),
            object: None,
            object_data: None,
            result: None,
            meta: None,
            timestamp: Utc::now(),
        }
    }

    /// Normalizes the legacy two-argument `(name, payload)` emit form.
    pub fn named(event: impl Into<String>, payload: Object) -> Self {
        Self {
            object_data: Some(payload),
            ..Self::new(event)
        }
    }

    pub fn with_object(mut self, object: EntityRef) -> Self {
        self.object = Some(object);
        self
    }

    pub fn with_object_data(mut self, data: Object) -> Self {
        self.object_data = Some(data);
        self
    }

    pub fn with_result(mut self, result: EntityRef) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_meta(mut self, meta: Object) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Context handed to the generation provider when a cascade fires.
///
/// `depth` tracks nested generation, bounded by the resolver configuration so
/// cyclic required chains fail fast instead of looping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationContext {
    pub owner_type: String,
    pub owner_id: Option<EntityId>,
    pub field: String,
    pub target_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub owner_data: Object,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub depth: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entity_ref_roundtrips_through_value() {
        let reference = EntityRef::new("Idea", Uuid::new_v4());
        let value = reference.to_value();
        assert_eq!(value["type"], json!("Idea"));
        assert_eq!(EntityRef::from_value(&value, "Idea"), Some(reference));
    }

    #[test]
    fn bare_id_strings_parse_with_a_fallback_type() {
        let id = Uuid::new_v4();
        let parsed = EntityRef::from_value(&json!(id.to_string()), "Idea").unwrap();
        assert_eq!(parsed.entity_type, "Idea");
        assert_eq!(parsed.id, id);

        assert!(EntityRef::from_value(&json!("not-a-uuid"), "Idea").is_none());
        assert!(EntityRef::from_value(&json!(42), "Idea").is_none());
    }

    #[test]
    fn named_event_carries_payload() {
        let mut payload = Object::new();
        payload.insert("title".to_string(), json!("hello"));
        let event = DBEvent::named("Post.created", payload);
        assert_eq!(event.event, "Post.created");
        assert_eq!(event.object_data.as_ref().unwrap()["title"], json!("hello"));
        assert!(event.object.is_none());

        // The wire shape uses camelCase for the payload key.
        let serialized = serde_json::to_value(&event).unwrap();
        assert_eq!(serialized["objectData"]["title"], json!("hello"));
        assert!(serialized.get("object_data").is_none());
    }
}
