//! JSON:API response denormalization
//!
//! Resolves the primary `data` rows of a document against the sideloaded
//! `included` set, producing self-contained flat entities with every
//! relationship nested inline. References are resolved recursively; a
//! reference whose target was not sideloaded resolves to an id-only stub
//! rather than failing the call.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};

use crate::document::{Document, EntityRef, ResourceObject};
use crate::error::ApiError;

/// A denormalized entity: `{id, ...attributes, ...resolved relationships}`
pub type FlatEntity = Map<String, Value>;

/// Sideloaded resources grouped by type, then keyed by id
pub type IncludedIndex<'a> = HashMap<&'a str, HashMap<&'a str, &'a ResourceObject>>;

/// Group the `included` array by entity type and id
///
/// At most one resource survives per (type, id); a later duplicate in
/// source order overwrites an earlier one.
pub fn group_included(included: &[ResourceObject]) -> IncludedIndex<'_> {
    let mut grouped: IncludedIndex = HashMap::new();

    for resource in included {
        grouped
            .entry(resource.kind.as_str())
            .or_default()
            .insert(resource.id.as_str(), resource);
    }

    grouped
}

/// Flatten a JSON:API document into self-contained entities
///
/// Rows keep the order of `data`. Relationships resolve against the
/// `included` set only, never against other primary rows. A document
/// without an `included` section is refused outright.
pub fn denormalize(document: &Document) -> Result<Vec<FlatEntity>, ApiError> {
    let included = document.included.as_deref().ok_or(ApiError::MissingIncluded)?;
    let index = group_included(included);

    let mut rows = Vec::with_capacity(document.data.len());
    for resource in &document.data {
        let mut flat = resource.attributes.clone();
        flat.insert("id".to_string(), Value::String(resource.id.clone()));

        let mut on_path = HashSet::new();
        let related = resolve_relationships(&resource.relationships, &index, &mut on_path)?;
        for (name, value) in related {
            flat.insert(name, value);
        }

        rows.push(flat);
    }

    Ok(rows)
}

/// Flatten a raw decoded JSON response
pub fn denormalize_value(response: Value) -> Result<Vec<FlatEntity>, ApiError> {
    let document = Document::from_value(response)?;
    denormalize(&document)
}

/// Resolve a single entity reference against the included index
///
/// A dangling reference resolves to `{id}` only. `on_path` holds the
/// (type, id) pairs currently being resolved above this call; a reference
/// already on the path short-circuits to the same stub, so reference
/// cycles terminate instead of recursing without bound.
fn resolve_reference(
    reference: &EntityRef,
    index: &IncludedIndex,
    on_path: &mut HashSet<(String, String)>,
) -> Result<FlatEntity, ApiError> {
    let resource = index
        .get(reference.kind.as_str())
        .and_then(|by_id| by_id.get(reference.id.as_str()));

    let resource = match resource {
        Some(resource) => *resource,
        None => return Ok(id_stub(&reference.id)),
    };

    let key = (reference.kind.clone(), reference.id.clone());
    if !on_path.insert(key.clone()) {
        return Ok(id_stub(&reference.id));
    }

    let mut flat = resource.attributes.clone();
    flat.insert("id".to_string(), Value::String(reference.id.clone()));

    let related = resolve_relationships(&resource.relationships, index, on_path)?;
    on_path.remove(&key);

    for (name, value) in related {
        flat.insert(name, value);
    }

    Ok(flat)
}

/// Resolve every entry of a `relationships` map
///
/// Returns the resolved sub-objects keyed by relationship name. A null or
/// empty `data` produces no key at all; a single reference resolves to a
/// nested object; a list resolves element by element, preserving order,
/// with dangling references appended as stubs rather than skipped.
fn resolve_relationships(
    relationships: &Map<String, Value>,
    index: &IncludedIndex,
    on_path: &mut HashSet<(String, String)>,
) -> Result<FlatEntity, ApiError> {
    let mut resolved = Map::new();

    for (name, relationship) in relationships {
        let data = relationship.get("data").unwrap_or(&Value::Null);

        match data {
            Value::Null => continue,
            Value::Object(_) => {
                let reference = parse_reference(data)?;
                let entity = resolve_reference(&reference, index, on_path)?;
                resolved.insert(name.clone(), Value::Object(entity));
            }
            Value::Array(items) => {
                if items.is_empty() {
                    continue;
                }
                let mut entities = Vec::with_capacity(items.len());
                for item in items {
                    let reference = parse_reference(item)?;
                    let entity = resolve_reference(&reference, index, on_path)?;
                    entities.push(Value::Object(entity));
                }
                resolved.insert(name.clone(), Value::Array(entities));
            }
            other => {
                return Err(ApiError::UnsupportedRelationshipShape {
                    shape: json_kind(other).to_string(),
                });
            }
        }
    }

    Ok(resolved)
}

fn parse_reference(value: &Value) -> Result<EntityRef, ApiError> {
    Ok(serde_json::from_value(value.clone())?)
}

fn id_stub(id: &str) -> FlatEntity {
    let mut stub = Map::new();
    stub.insert("id".to_string(), Value::String(id.to_string()));
    stub
}

/// Human-readable name of a JSON value's kind
fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
