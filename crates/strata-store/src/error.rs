use strata_migrate::{PlanError, SchemaVersion};

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors from data-context operations against a store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend error")]
    Backend(#[source] BoxError),
    #[error("failed to commit staged changes")]
    TransactionCommitFailed(#[source] BoxError),
    #[error("failed to encode record for entity {entity}: {reason}")]
    Encode { entity: String, reason: String },
    #[error("failed to decode record for entity {entity}: {reason}")]
    Decode { entity: String, reason: String },
    #[error("entity type {0} is not part of schema version {1}")]
    UnknownEntity(String, SchemaVersion),
    #[error("entity {entity} has no field {field}")]
    UnknownField { entity: String, field: String },
    #[error("required field {entity}.{field} is missing and has no default")]
    MissingField { entity: String, field: String },
    #[error("value for unique field {entity}.{field} already exists")]
    UniqueViolation { entity: String, field: String },
    #[error("record has no assigned id; insert it first")]
    UnassignedId,
}

/// Errors from opening a store at a target schema version.
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("target version {0} is not registered")]
    UnknownTargetVersion(SchemaVersion),
    #[error("store version {found} is unsupported: no migration path to {target}")]
    UnsupportedStoreVersion {
        found: SchemaVersion,
        target: SchemaVersion,
    },
    #[error(transparent)]
    Plan(#[from] PlanError),
    /// A migration stage failed. The store is left at the version recorded
    /// by the last stage that committed; nothing from the failed stage
    /// applies.
    #[error("migration stage {from} -> {to} failed")]
    MigrationFailed {
        from: SchemaVersion,
        to: SchemaVersion,
        #[source]
        cause: BoxError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}
