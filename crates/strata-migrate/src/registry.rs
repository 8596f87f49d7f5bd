//! Schema descriptors and the ordered registry of versions.
//!
//! A [`SchemaDescriptor`] is the full shape of the data model at one
//! [`SchemaVersion`]: which entity types exist, which fields they carry
//! (with optionality, uniqueness, and declared defaults), and how entities
//! own each other (relationships with a delete-propagation rule).
//!
//! Descriptors are immutable once registered. The [`SchemaRegistry`] is
//! built once at startup and never mutated afterwards; registering a
//! duplicate version is a fatal configuration error.

use crate::error::RegistryError;
use crate::record::Value;
use crate::version::SchemaVersion;

/// The kind of value a field holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Int,
    Float,
    Text,
    /// Reference to a record of the named entity type.
    Reference(String),
}

/// The shape of one field of an entity at a given schema version.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    /// Optional fields may be `Null`; absent optionals are filled with
    /// `Null` on insert and during structural remap.
    pub optional: bool,
    /// Unique fields are validated across the whole entity on commit.
    pub unique: bool,
    /// Declared default, used for records predating the field.
    pub default: Option<Value>,
}

impl FieldDescriptor {
    /// A required field with no default.
    pub fn required(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: false,
            unique: false,
            default: None,
        }
    }

    /// An optional field.
    pub fn optional(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: true,
            unique: false,
            default: None,
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// What happens to owned records when their owner is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteRule {
    /// Deleting the owner deletes every owned record.
    Cascade,
    /// Owned records are left alone (their back-reference dangles).
    NoAction,
}

/// An ownership relationship from one entity type to another.
///
/// The owned side carries a `Reference` field pointing back at the owner;
/// `inverse_field` names it. Delete propagation is evaluated at delete time
/// by walking this rule, never inferred.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipDescriptor {
    /// Name of the relationship on the owning entity (e.g. `animals`).
    pub name: String,
    /// Entity type of the owned records.
    pub target: String,
    /// Field on the owned entity that references the owner.
    pub inverse_field: String,
    pub on_delete: DeleteRule,
}

/// The shape of one persisted entity type at a given schema version.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
    pub relationships: Vec<RelationshipDescriptor>,
}

impl EntityDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn relationship(mut self, relationship: RelationshipDescriptor) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn field_named(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// The complete data-model shape at one schema version.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDescriptor {
    pub version: SchemaVersion,
    pub entities: Vec<EntityDescriptor>,
}

impl SchemaDescriptor {
    pub fn new(version: SchemaVersion) -> Self {
        Self {
            version,
            entities: Vec::new(),
        }
    }

    pub fn entity(mut self, entity: EntityDescriptor) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn entity_named(&self, name: &str) -> Option<&EntityDescriptor> {
        self.entities.iter().find(|e| e.name == name)
    }
}

/// Ordered catalog of every schema version the process knows about.
///
/// Kept sorted ascending by version on insert.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    descriptors: Vec<SchemaDescriptor>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema descriptor.
    ///
    /// Fails with [`RegistryError::DuplicateVersion`] if the version is
    /// already present.
    pub fn register(&mut self, descriptor: SchemaDescriptor) -> Result<(), RegistryError> {
        if self.contains(descriptor.version) {
            return Err(RegistryError::DuplicateVersion(descriptor.version));
        }
        self.descriptors.push(descriptor);
        self.descriptors.sort_by_key(|d| d.version);
        Ok(())
    }

    /// All registered descriptors, ascending by version.
    pub fn ordered(&self) -> &[SchemaDescriptor] {
        &self.descriptors
    }

    /// The highest-versioned descriptor.
    pub fn latest(&self) -> Result<&SchemaDescriptor, RegistryError> {
        self.descriptors.last().ok_or(RegistryError::EmptyRegistry)
    }

    pub fn get(&self, version: SchemaVersion) -> Option<&SchemaDescriptor> {
        self.descriptors.iter().find(|d| d.version == version)
    }

    pub fn contains(&self, version: SchemaVersion) -> bool {
        self.get(version).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(major: u32) -> SchemaDescriptor {
        SchemaDescriptor::new(SchemaVersion::new(major, 0, 0))
            .entity(EntityDescriptor::new("widget").field(FieldDescriptor::required(
                "name",
                FieldKind::Text,
            )))
    }

    #[test]
    fn register_keeps_versions_sorted() {
        let mut registry = SchemaRegistry::new();
        registry.register(descriptor(3)).unwrap();
        registry.register(descriptor(1)).unwrap();
        registry.register(descriptor(2)).unwrap();

        let versions: Vec<u32> = registry.ordered().iter().map(|d| d.version.major).collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[test]
    fn duplicate_version_rejected() {
        let mut registry = SchemaRegistry::new();
        registry.register(descriptor(1)).unwrap();

        let err = registry.register(descriptor(1)).unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateVersion(SchemaVersion::new(1, 0, 0))
        );
    }

    #[test]
    fn latest_returns_highest() {
        let mut registry = SchemaRegistry::new();
        registry.register(descriptor(1)).unwrap();
        registry.register(descriptor(2)).unwrap();

        assert_eq!(
            registry.latest().unwrap().version,
            SchemaVersion::new(2, 0, 0)
        );
    }

    #[test]
    fn latest_on_empty_registry_fails() {
        let registry = SchemaRegistry::new();
        assert_eq!(registry.latest().unwrap_err(), RegistryError::EmptyRegistry);
    }

    #[test]
    fn lookup_by_version() {
        let mut registry = SchemaRegistry::new();
        registry.register(descriptor(1)).unwrap();

        assert!(registry.contains(SchemaVersion::new(1, 0, 0)));
        assert!(!registry.contains(SchemaVersion::new(9, 0, 0)));
        assert!(registry.get(SchemaVersion::new(1, 0, 0)).is_some());
    }
}
