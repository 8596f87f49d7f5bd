//! # strata-migrate
//!
//! The migration core for strata stores: versioned schemas and the staged
//! transformations between them.
//!
//! A store's data model evolves in discrete, totally ordered
//! [`SchemaVersion`]s. Each version is described by a [`SchemaDescriptor`]
//! (entity shapes, defaults, relationships) held in a [`SchemaRegistry`].
//! A [`MigrationPlan`] chains directional [`MigrationStage`]s between
//! adjacent versions; resolving a plan against a store's current and target
//! versions yields the exact stage subsequence to run.
//!
//! ## How a stage runs
//!
//! 1. The **pre-hook** runs against a transaction-scoped data context.
//! 2. The **structural remap** reshapes every record from the source schema
//!    to the target schema: newly introduced fields are filled from their
//!    declared defaults, removed fields are dropped, unrelated data is left
//!    untouched.
//! 3. The **post-hook** runs, free to inspect and transform the already
//!    remapped data before the stage commits.
//!
//! Plans are linear chains, never graphs: schemas are registered in strict
//! migration order, so v1→v3 always means running v1→v2 then v2→v3.
//! Rollback is its own descending chain with its own stages.
//!
//! This crate knows nothing about storage. The store side (backends, the
//! data context, the opener) lives in `strata-store`; hooks reach the data
//! through the object-safe [`StageContext`] trait.

mod error;
mod plan;
mod record;
mod registry;
mod stage;
mod version;

pub use error::{HookError, PlanError, RegistryError, StageError};
pub use plan::{Direction, MigrationPlan};
pub use record::{Record, RecordId, Value};
pub use registry::{
    DeleteRule, EntityDescriptor, FieldDescriptor, FieldKind, RelationshipDescriptor,
    SchemaDescriptor, SchemaRegistry,
};
pub use stage::{remap_records, MigrationStage, StageContext};
pub use version::SchemaVersion;
