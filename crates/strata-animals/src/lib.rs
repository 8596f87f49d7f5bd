//! Sample animal catalog built on the strata migration engine.
//!
//! Two schema versions of the same catalog:
//!
//! - **v1** — animals (name, diet, optional category reference) and
//!   animal categories (unique name, cascade-owning their animals);
//! - **v2** — the same, plus an `extinct` flag on animals, defaulting to
//!   `false`.
//!
//! The forward plan carries one custom stage whose post-hook backfills
//! `extinct` on every animal created under v1. The rollback plan is a
//! lightweight stage: the structural remap drops the flag, so rolling back
//! is lossy for it by design.

use core::fmt;

use tracing::{debug, info};

use strata_migrate::{
    DeleteRule, EntityDescriptor, FieldDescriptor, FieldKind, MigrationPlan, MigrationStage,
    PlanError, Record, RecordId, RegistryError, RelationshipDescriptor, SchemaDescriptor,
    SchemaRegistry, SchemaVersion, StageContext, Value,
};
use strata_store::{DataContext, StoreBackend, StoreConfig, StoreError, StoreOpener};

pub const ANIMAL: &str = "animal";
pub const ANIMAL_CATEGORY: &str = "animal_category";

pub const SCHEMA_V1: SchemaVersion = SchemaVersion::new(1, 0, 0);
pub const SCHEMA_V2: SchemaVersion = SchemaVersion::new(2, 0, 0);

/// Failures while wiring up the catalog's schemas and plans.
///
/// These are startup configuration errors; a running catalog never
/// produces them.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// What an animal eats. Stored as its display text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diet {
    Herbivorous,
    Carnivorous,
    Omnivorous,
}

impl Diet {
    pub fn as_str(&self) -> &'static str {
        match self {
            Diet::Herbivorous => "Herbivore",
            Diet::Carnivorous => "Carnivore",
            Diet::Omnivorous => "Omnivore",
        }
    }

    pub fn value(&self) -> Value {
        Value::Text(self.as_str().to_string())
    }
}

impl fmt::Display for Diet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Schema versions ─────────────────────────────────────────────────

pub fn schema_v1() -> SchemaDescriptor {
    SchemaDescriptor::new(SCHEMA_V1)
        .entity(category_descriptor())
        .entity(
            EntityDescriptor::new(ANIMAL)
                .field(FieldDescriptor::required("name", FieldKind::Text))
                .field(FieldDescriptor::required("diet", FieldKind::Text))
                .field(FieldDescriptor::optional(
                    "category",
                    FieldKind::Reference(ANIMAL_CATEGORY.into()),
                )),
        )
}

/// v2 adds the `extinct` flag; everything else is unchanged.
pub fn schema_v2() -> SchemaDescriptor {
    SchemaDescriptor::new(SCHEMA_V2)
        .entity(category_descriptor())
        .entity(
            EntityDescriptor::new(ANIMAL)
                .field(FieldDescriptor::required("name", FieldKind::Text))
                .field(FieldDescriptor::required("diet", FieldKind::Text))
                .field(FieldDescriptor::optional(
                    "category",
                    FieldKind::Reference(ANIMAL_CATEGORY.into()),
                ))
                .field(
                    FieldDescriptor::optional("extinct", FieldKind::Bool)
                        .with_default(Value::Bool(false)),
                ),
        )
}

/// Identical in both versions: unique name, cascade-owns its animals.
fn category_descriptor() -> EntityDescriptor {
    EntityDescriptor::new(ANIMAL_CATEGORY)
        .field(FieldDescriptor::required("name", FieldKind::Text).unique())
        .relationship(RelationshipDescriptor {
            name: "animals".into(),
            target: ANIMAL.into(),
            inverse_field: "category".into(),
            on_delete: DeleteRule::Cascade,
        })
}

pub fn registry() -> Result<SchemaRegistry, RegistryError> {
    let mut registry = SchemaRegistry::new();
    registry.register(schema_v1())?;
    registry.register(schema_v2())?;
    Ok(registry)
}

// ── Migration plans ─────────────────────────────────────────────────

/// v1 → v2. The structural remap already fills `extinct` from its
/// declared default; the post-hook writes it explicitly anyway so the
/// backfill holds even if the default ever changes.
pub fn forward_plan(registry: &SchemaRegistry) -> Result<MigrationPlan, PlanError> {
    let stage = MigrationStage::custom(
        SCHEMA_V1,
        SCHEMA_V2,
        |ctx: &mut dyn StageContext| {
            let animals = ctx.fetch_all(ANIMAL)?;
            debug!(count = animals.len(), "migrating animals to v2");
            Ok(())
        },
        |ctx: &mut dyn StageContext| {
            for mut animal in ctx.fetch_all(ANIMAL)? {
                animal.set("extinct", Value::Bool(false));
                ctx.update(animal)?;
            }
            Ok(())
        },
    );
    MigrationPlan::new(registry, vec![SCHEMA_V1, SCHEMA_V2], vec![stage])
}

/// v2 → v1. No hooks: the remap drops `extinct`, nothing else changes.
pub fn rollback_plan(registry: &SchemaRegistry) -> Result<MigrationPlan, PlanError> {
    MigrationPlan::new(
        registry,
        vec![SCHEMA_V2, SCHEMA_V1],
        vec![MigrationStage::lightweight(SCHEMA_V2, SCHEMA_V1)],
    )
}

/// The fully wired opener for the catalog: both schema versions, both
/// plans.
pub fn catalog_opener() -> Result<StoreOpener, CatalogError> {
    let registry = registry()?;
    let forward = forward_plan(&registry)?;
    let rollback = rollback_plan(&registry)?;
    Ok(StoreOpener::new(
        StoreConfig::new(registry)
            .forward_plan(forward)
            .rollback_plan(rollback),
    ))
}

// ── Records and seed data ───────────────────────────────────────────

pub fn animal(name: &str, diet: Diet, category: Option<RecordId>) -> Record {
    let mut record = Record::new(ANIMAL)
        .with_field("name", Value::Text(name.into()))
        .with_field("diet", diet.value());
    if let Some(id) = category {
        record = record.with_field("category", Value::Ref(id));
    }
    record
}

pub fn category(name: &str) -> Record {
    Record::new(ANIMAL_CATEGORY).with_field("name", Value::Text(name.into()))
}

/// Insert and commit the sample catalog: six categories and six animals,
/// four of them mammals. Fish, Invertebrate, and Reptile start empty.
pub fn seed_sample_data<B: StoreBackend>(ctx: &mut DataContext<B>) -> Result<(), StoreError> {
    let amphibian = ctx.insert(category("Amphibian"))?;
    let bird = ctx.insert(category("Bird"))?;
    ctx.insert(category("Fish"))?;
    ctx.insert(category("Invertebrate"))?;
    let mammal = ctx.insert(category("Mammal"))?;
    ctx.insert(category("Reptile"))?;

    ctx.insert(animal("Dog", Diet::Carnivorous, Some(mammal)))?;
    ctx.insert(animal("Cat", Diet::Carnivorous, Some(mammal)))?;
    ctx.insert(animal("Red kangaroo", Diet::Herbivorous, Some(mammal)))?;
    ctx.insert(animal("Southern gibbon", Diet::Herbivorous, Some(mammal)))?;
    ctx.insert(animal("House sparrow", Diet::Omnivorous, Some(bird)))?;
    ctx.insert(animal("Newt", Diet::Carnivorous, Some(amphibian)))?;

    ctx.save()?;
    info!("seeded sample catalog");
    Ok(())
}
