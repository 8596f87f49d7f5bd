use core::fmt;
// BTreeMap keeps field iteration deterministic across runs.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identifier for one persisted record, unique within a store.
///
/// Ids are allocated from a counter persisted alongside the data, so they
/// stay stable across migration and rollback.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A dynamically typed field value.
///
/// Records are untyped at compile time so that one engine can host every
/// registered schema version at runtime; the descriptors in
/// [`crate::SchemaDescriptor`] say which fields a given version expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Reference to another record (a to-one relationship).
    Ref(RecordId),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_ref_id(&self) -> Option<RecordId> {
        match self {
            Value::Ref(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// One persisted entity instance, independent of any concrete Rust type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Record id. `RecordId(0)` until the data context assigns one on insert.
    pub id: RecordId,
    /// Name of the entity type this record belongs to.
    pub entity: String,
    /// Field values keyed by field name.
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    /// Start a new, not-yet-inserted record of the given entity type.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            id: RecordId(0),
            entity: entity.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field assignment.
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }
}
