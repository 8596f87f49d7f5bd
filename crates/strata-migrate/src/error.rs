use crate::version::SchemaVersion;

/// Cause type carried out of migration hooks.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Registry construction errors. Fatal at startup: a process must not run
/// with an invalid registry.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("schema version {0} is already registered")]
    DuplicateVersion(SchemaVersion),
    #[error("schema registry is empty")]
    EmptyRegistry,
}

/// Plan construction and resolution errors.
///
/// Construction variants (`UnknownVersion`, `EmptyPlan`, `NotMonotonic`,
/// `StageMismatch`) are fatal configuration errors; `NoPathFound` is also
/// returned by [`crate::MigrationPlan::resolve`] at open time.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("no migration path from {from} to {to}")]
    NoPathFound {
        from: SchemaVersion,
        to: SchemaVersion,
    },
    #[error("schema version {0} is not registered")]
    UnknownVersion(SchemaVersion),
    #[error("a migration plan needs at least one schema version")]
    EmptyPlan,
    #[error("plan traversal must be strictly ascending or strictly descending")]
    NotMonotonic,
    #[error("stage {from} -> {to} does not connect consecutive plan schemas")]
    StageMismatch {
        from: SchemaVersion,
        to: SchemaVersion,
    },
}

/// Failure of a single migration stage.
///
/// A stage failure aborts the whole migration run; nothing from the failed
/// stage is committed.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("pre-migration hook for {from} -> {to} failed")]
    PreHook {
        from: SchemaVersion,
        to: SchemaVersion,
        #[source]
        cause: HookError,
    },
    #[error("post-migration hook for {from} -> {to} failed")]
    PostHook {
        from: SchemaVersion,
        to: SchemaVersion,
        #[source]
        cause: HookError,
    },
    #[error("cannot remap {entity}.{field}: required field has no declared default")]
    MissingDefault { entity: String, field: String },
    #[error("data context failed during structural remap")]
    Context(#[source] HookError),
}
