//! Twin identity and attribute state.
//!
//! A twin is owned by the remote store. The pipeline only ever sees immutable
//! snapshots of it, taken by a single read.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier of a remote twin (e.g. `co-01`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TwinId(String);

impl TwinId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TwinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TwinId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TwinId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Semantic kind of a stored attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Text,
    Number,
    /// Array of exactly three numbers (vector sensor channel).
    Vector3,
    /// Anything else the store may hold (objects, booleans, null, ...).
    Other,
}

impl AttributeKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => AttributeKind::Text,
            Value::Number(_) => AttributeKind::Number,
            Value::Array(items) if items.len() == 3 && items.iter().all(Value::is_number) => {
                AttributeKind::Vector3
            }
            _ => AttributeKind::Other,
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttributeKind::Text => "text",
            AttributeKind::Number => "number",
            AttributeKind::Vector3 => "vector3",
            AttributeKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// Attribute name → value mapping as currently stored for a twin.
///
/// Store bookkeeping keys (`$dtId`, `$etag`, `$metadata`) are not attributes
/// and are stripped on construction from a raw document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TwinAttributes(BTreeMap<String, Value>);

impl TwinAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a raw twin document, dropping `$`-prefixed system keys.
    pub fn from_document(document: Map<String, Value>) -> Self {
        Self(
            document
                .into_iter()
                .filter(|(key, _)| !key.starts_with('$'))
                .collect(),
        )
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn kind_of(&self, key: &str) -> Option<AttributeKind> {
        self.0.get(key).map(AttributeKind::of)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl FromIterator<(String, Value)> for TwinAttributes {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One read of a twin: the attributes plus the store's concurrency token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwinSnapshot {
    pub id: TwinId,
    /// Opaque version tag; a patch conditioned on it fails if the twin moved on.
    pub etag: Option<String>,
    pub attributes: TwinAttributes,
    /// `$`-prefixed keys exactly as the store returned them.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub system: Map<String, Value>,
}

impl TwinSnapshot {
    pub fn new(id: TwinId, etag: Option<String>, attributes: TwinAttributes) -> Self {
        Self {
            id,
            etag,
            attributes,
            system: Map::new(),
        }
    }

    /// Split a raw store document into attributes and system keys.
    pub fn from_document(id: TwinId, etag: Option<String>, document: Map<String, Value>) -> Self {
        let (system, attributes): (Map<String, Value>, Map<String, Value>) = document
            .into_iter()
            .partition(|(key, _)| key.starts_with('$'));
        Self {
            id,
            etag,
            attributes: TwinAttributes::from_document(attributes),
            system,
        }
    }

    pub fn with_system(mut self, system: Map<String, Value>) -> Self {
        self.system = system;
        self
    }

    /// Render as a store document: system keys as read (`$dtId` and `$etag`
    /// filled in when the store omitted them), then attributes.
    pub fn to_document(&self) -> Value {
        let mut doc = self.system.clone();
        doc.entry("$dtId")
            .or_insert_with(|| Value::String(self.id.to_string()));
        if let Some(etag) = &self.etag {
            doc.entry("$etag")
                .or_insert_with(|| Value::String(etag.clone()));
        }
        for (key, value) in self.attributes.iter() {
            doc.insert(key.clone(), value.clone());
        }
        Value::Object(doc)
    }
}
