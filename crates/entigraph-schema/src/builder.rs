use crate::pattern::{self, FieldDescriptor, Primitive, RelationshipSpec};
use crate::verbs::{self, VerbConjugation};
use entigraph_core::{EntigraphError, Result};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// CRUD verbs every schema starts with; a null definition entry removes one.
const DEFAULT_VERBS: &[&str] = &["create", "update", "delete"];

/// Fully built schema for one entity type. Immutable after registration.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySchema {
    pub name: String,
    pub singular: String,
    pub plural: String,
    pub slug: String,
    pub fields: BTreeMap<String, FieldDescriptor>,
    pub relationships: BTreeMap<String, FieldDescriptor>,
    pub verbs: BTreeMap<String, VerbConjugation>,
    pub disabled_verbs: BTreeSet<String>,
    /// Raw input definition, retained for diagnostics.
    pub raw: Value,
}

impl EntitySchema {
    pub fn relationship(&self, field: &str) -> Option<&RelationshipSpec> {
        self.relationships.get(field).and_then(|d| d.relationship())
    }

    pub fn relationship_field(&self, field: &str) -> Option<&FieldDescriptor> {
        self.relationships.get(field)
    }
}

fn is_bare_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Builds a schema from one entity definition, partitioning entries into
/// fields, relationships, custom verbs, and disabled verbs.
pub fn build_schema(name: &str, definition: &Value) -> Result<EntitySchema> {
    let map = definition
        .as_object()
        .ok_or_else(|| EntigraphError::Parse {
            entity: name.to_string(),
            field: String::new(),
            reason: "entity definition must be an object".to_string(),
        })?;

    let mut fields = BTreeMap::new();
    let mut relationships = BTreeMap::new();
    let mut verbs: BTreeMap<String, VerbConjugation> = DEFAULT_VERBS
        .iter()
        .map(|verb| (verb.to_string(), verbs::conjugate(verb)))
        .collect();
    let mut disabled = BTreeSet::new();

    for (key, value) in map {
        match value {
            Value::Null => {
                if verbs.remove(key).is_some() {
                    disabled.insert(key.clone());
                } else {
                    warn!(entity = name, field = %key, "null entry disables nothing; dropping");
                }
            }
            // A bare action name as its own value declares a custom verb.
            Value::String(s)
                if s == key && is_bare_identifier(s) && s.parse::<Primitive>().is_err() =>
            {
                verbs.insert(key.clone(), verbs::conjugate(s));
            }
            _ => {
                let descriptor = pattern::parse(key, value);
                if descriptor.is_relationship() {
                    relationships.insert(key.clone(), descriptor);
                } else {
                    fields.insert(key.clone(), descriptor);
                }
            }
        }
    }

    let singular = verbs::decapitalize(name);
    debug!(
        entity = name,
        fields = fields.len(),
        relationships = relationships.len(),
        "built schema"
    );

    Ok(EntitySchema {
        name: name.to_string(),
        plural: verbs::pluralize(&singular),
        slug: verbs::slugify(name),
        singular,
        fields,
        relationships,
        verbs,
        disabled_verbs: disabled,
        raw: definition.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Direction;
    use serde_json::json;

    #[test]
    fn partitions_fields_and_relationships() {
        let schema = build_schema(
            "Startup",
            &json!({
                "name": "string!",
                "mrr": "Monthly recurring revenue (number)",
                "idea": "What is the core idea? ->Idea",
                "founders": ["->Founder"]
            }),
        )
        .unwrap();

        assert_eq!(schema.fields.len(), 2);
        assert_eq!(schema.relationships.len(), 2);
        assert_eq!(
            schema.relationship("idea").unwrap().direction(),
            Direction::Forward
        );
        assert!(schema.relationship_field("founders").unwrap().modifiers.array);
    }

    #[test]
    fn derived_name_forms() {
        let schema = build_schema("BlogPost", &json!({"title": "string"})).unwrap();
        assert_eq!(schema.singular, "blogPost");
        assert_eq!(schema.plural, "blogPosts");
        assert_eq!(schema.slug, "blog-post");
    }

    #[test]
    fn custom_verbs_and_disabled_verbs() {
        let schema = build_schema(
            "Post",
            &json!({
                "title": "string",
                "publish": "publish",
                "delete": null
            }),
        )
        .unwrap();

        assert!(schema.verbs.contains_key("publish"));
        assert_eq!(
            schema.verbs["publish"].inverse.as_deref(),
            Some("unpublish")
        );
        assert!(!schema.verbs.contains_key("delete"));
        assert!(schema.disabled_verbs.contains("delete"));
        assert!(schema.verbs.contains_key("create"));
        assert!(!schema.fields.contains_key("publish"));
    }

    #[test]
    fn bare_type_names_stay_fields() {
        let schema = build_schema("Note", &json!({"string": "string"})).unwrap();
        assert!(schema.fields.contains_key("string"));
        assert!(!schema.verbs.contains_key("string"));
    }

    #[test]
    fn raw_definition_is_retained() {
        let definition = json!({"title": "string"});
        let schema = build_schema("Post", &definition).unwrap();
        assert_eq!(schema.raw, definition);
    }

    #[test]
    fn non_object_definition_is_a_parse_error() {
        assert!(build_schema("Post", &json!("nope")).is_err());
    }
}
