//! Opening a store at a target schema version.
//!
//! The [`StoreOpener`] is the single entry point applications use. Given a
//! backend, a target version, and a direction, it reads the store's
//! recorded version, resolves the stage chain from the configured plan,
//! runs each stage in its own transaction, and hands back a
//! [`DataContext`] positioned at the target schema.
//!
//! Each stage commits atomically together with its recorded-version bump,
//! so a crash or hook failure mid-chain leaves the store at the last
//! version that fully committed. Re-opening resumes from there.

use tracing::{debug, info};

use strata_migrate::{
    Direction, MigrationPlan, PlanError, SchemaDescriptor, SchemaRegistry, SchemaVersion,
};

use crate::backend::StoreBackend;
use crate::context::DataContext;
use crate::error::{OpenError, StoreError};

/// Everything the opener needs to know about a store family: the schema
/// registry plus the migration plans connecting its versions.
pub struct StoreConfig {
    registry: SchemaRegistry,
    forward: Option<MigrationPlan>,
    rollback: Option<MigrationPlan>,
    sync_enabled: bool,
}

impl StoreConfig {
    pub fn new(registry: SchemaRegistry) -> Self {
        Self {
            registry,
            forward: None,
            rollback: None,
            sync_enabled: false,
        }
    }

    /// The plan used when opening with [`Direction::Forward`].
    pub fn forward_plan(mut self, plan: MigrationPlan) -> Self {
        self.forward = Some(plan);
        self
    }

    /// The plan used when opening with [`Direction::Rollback`].
    pub fn rollback_plan(mut self, plan: MigrationPlan) -> Self {
        self.rollback = Some(plan);
        self
    }

    /// Pass-through flag for an external sync collaborator, readable via
    /// [`StoreOpener::sync_enabled`]. Has no effect on migration
    /// semantics.
    pub fn enable_sync(mut self, enabled: bool) -> Self {
        self.sync_enabled = enabled;
        self
    }
}

/// Opens stores, migrating them to a target version on the way.
pub struct StoreOpener {
    config: StoreConfig,
}

impl StoreOpener {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.config.registry
    }

    pub fn sync_enabled(&self) -> bool {
        self.config.sync_enabled
    }

    /// Bring `backend` to `target` and return a context positioned there.
    ///
    /// A fresh store (no recorded version) is created directly at `target`
    /// without running any stages. A store already at `target` opens
    /// without running any stages — opening is idempotent. Anything else
    /// must be reachable through the plan configured for `direction`, one
    /// committed transaction per stage.
    pub fn open<B: StoreBackend>(
        &self,
        backend: B,
        target: SchemaVersion,
        direction: Direction,
    ) -> Result<DataContext<B>, OpenError> {
        let target_schema = self
            .config
            .registry
            .get(target)
            .ok_or(OpenError::UnknownTargetVersion(target))?;

        let recorded = backend
            .recorded_version()
            .map_err(|e| StoreError::Backend(Box::new(e)))?;

        let current = match recorded {
            None => {
                // Fresh store: stamp the target version and start clean.
                info!(version = %target, "creating fresh store");
                let mut ctx = DataContext::new(backend, target_schema.clone())?;
                ctx.stage_version(target);
                ctx.save()?;
                return Ok(ctx);
            }
            Some(current) => current,
        };

        if current == target {
            debug!(version = %target, "store already at target version");
            return Ok(DataContext::new(backend, target_schema.clone())?);
        }

        let plan = match direction {
            Direction::Forward => self.config.forward.as_ref(),
            Direction::Rollback => self.config.rollback.as_ref(),
        };
        let unsupported = || OpenError::UnsupportedStoreVersion {
            found: current,
            target,
        };
        let plan = plan.ok_or_else(unsupported)?;

        let stages = plan.resolve(current, target).map_err(|e| match e {
            PlanError::NoPathFound { .. } => unsupported(),
            other => OpenError::Plan(other),
        })?;

        info!(
            from = %current,
            to = %target,
            %direction,
            stages = stages.len(),
            "migrating store"
        );

        let mut backend = backend;
        for stage in stages {
            let from_schema = self.schema_for(stage.from_version())?;
            let to_schema = self.schema_for(stage.to_version())?;

            // The stage sees the store shaped by its target schema; its
            // version bump rides in the same batch as its data changes.
            let mut ctx = DataContext::new(backend, to_schema.clone())?;
            stage
                .run(from_schema, to_schema, &mut ctx)
                .map_err(|cause| OpenError::MigrationFailed {
                    from: stage.from_version(),
                    to: stage.to_version(),
                    cause: Box::new(cause),
                })?;
            ctx.stage_version(stage.to_version());
            ctx.save().map_err(|cause| OpenError::MigrationFailed {
                from: stage.from_version(),
                to: stage.to_version(),
                cause: Box::new(cause),
            })?;
            backend = ctx.into_backend();
        }

        Ok(DataContext::new(backend, target_schema.clone())?)
    }

    /// Open (or create) a redb-backed store at `path` and bring it to
    /// `target`.
    #[cfg(feature = "redb")]
    pub fn open_path<P: AsRef<std::path::Path>>(
        &self,
        path: P,
        target: SchemaVersion,
        direction: Direction,
    ) -> Result<DataContext<crate::redb::RedbBackend>, OpenError> {
        let backend = crate::redb::RedbBackend::open(path)
            .map_err(|e| StoreError::Backend(Box::new(e)))?;
        self.open(backend, target, direction)
    }

    fn schema_for(&self, version: SchemaVersion) -> Result<&SchemaDescriptor, OpenError> {
        // Plans validate registration at construction; a miss here means
        // the plan was built against a different registry.
        self.config
            .registry
            .get(version)
            .ok_or(OpenError::Plan(PlanError::UnknownVersion(version)))
    }
}
