//! JSON:API wire model
//!
//! Typed view of the `data` + `included` document subset this client
//! consumes. Relationship linkage stays as raw JSON so a malformed `data`
//! shape is reported by the denormalizer instead of failing the whole
//! deserialization.

use serde::Deserialize;
use serde_json::{Map, Value};

/// A resource as it appears in `data` or `included`
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceObject {
    /// Entity type, e.g. "product"
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    /// Attribute name to value
    #[serde(default)]
    pub attributes: Map<String, Value>,
    /// Relationship name to relationship object (`{"data": ...}`)
    #[serde(default)]
    pub relationships: Map<String, Value>,
}

/// Identifies an entity by type and id, without its attributes
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EntityRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

/// A full JSON:API response document
#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    /// Primary collection, in server order
    #[serde(default)]
    pub data: Vec<ResourceObject>,
    /// Sideloaded related entities, if the caller requested them
    pub included: Option<Vec<ResourceObject>>,
}

impl Document {
    /// Deserialize a document from a decoded JSON response
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}
