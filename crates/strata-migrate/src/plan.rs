//! Migration plans: ordered chains of stages connecting schema versions.

use core::fmt;

use crate::error::PlanError;
use crate::registry::SchemaRegistry;
use crate::stage::MigrationStage;
use crate::version::SchemaVersion;

/// Which way a plan traverses the version order.
///
/// A plan never infers direction beyond comparing its schema sequence; the
/// store opener picks the plan matching the caller's explicit direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Rollback,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => f.write_str("forward"),
            Direction::Rollback => f.write_str("rollback"),
        }
    }
}

/// An ordered chain of migration stages over a sequence of schema versions.
///
/// Invariants, validated at construction:
/// - every schema in the traversal is registered;
/// - the traversal is strictly ascending (forward) or strictly descending
///   (rollback);
/// - `stages[i]` connects `schemas[i]` to `schemas[i + 1]`, so consecutive
///   schemas are joined by exactly one stage, in order.
///
/// Plans are built once at startup and immutable thereafter; construction
/// failures are fatal configuration errors.
#[derive(Debug)]
pub struct MigrationPlan {
    schemas: Vec<SchemaVersion>,
    stages: Vec<MigrationStage>,
    direction: Direction,
}

impl MigrationPlan {
    pub fn new(
        registry: &SchemaRegistry,
        schemas: Vec<SchemaVersion>,
        stages: Vec<MigrationStage>,
    ) -> Result<Self, PlanError> {
        if schemas.is_empty() {
            return Err(PlanError::EmptyPlan);
        }
        for version in &schemas {
            if !registry.contains(*version) {
                return Err(PlanError::UnknownVersion(*version));
            }
        }

        let ascending = schemas.windows(2).all(|w| w[0] < w[1]);
        let descending = schemas.windows(2).all(|w| w[0] > w[1]);
        if !ascending && !descending {
            return Err(PlanError::NotMonotonic);
        }
        let direction = if descending && schemas.len() > 1 {
            Direction::Rollback
        } else {
            Direction::Forward
        };

        if stages.len() + 1 != schemas.len() {
            return Err(PlanError::NoPathFound {
                from: schemas[0],
                to: *schemas.last().expect("non-empty"),
            });
        }
        for (i, stage) in stages.iter().enumerate() {
            if stage.from_version() != schemas[i] || stage.to_version() != schemas[i + 1] {
                return Err(PlanError::StageMismatch {
                    from: stage.from_version(),
                    to: stage.to_version(),
                });
            }
        }

        Ok(Self {
            schemas,
            stages,
            direction,
        })
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn schemas(&self) -> &[SchemaVersion] {
        &self.schemas
    }

    pub fn stages(&self) -> &[MigrationStage] {
        &self.stages
    }

    /// The ordered stage subsequence taking a store from `current` to
    /// `target`, in this plan's traversal order.
    ///
    /// Empty when the versions are equal. Fails with
    /// [`PlanError::NoPathFound`] when either version is off this plan's
    /// chain or `target` lies before `current` in traversal order (this
    /// plan only runs one way; the opposite direction is a different plan).
    pub fn resolve(
        &self,
        current: SchemaVersion,
        target: SchemaVersion,
    ) -> Result<&[MigrationStage], PlanError> {
        if current == target {
            return Ok(&[]);
        }
        let no_path = || PlanError::NoPathFound {
            from: current,
            to: target,
        };
        let from = self
            .schemas
            .iter()
            .position(|v| *v == current)
            .ok_or_else(no_path)?;
        let to = self
            .schemas
            .iter()
            .position(|v| *v == target)
            .ok_or_else(no_path)?;
        if to < from {
            return Err(no_path());
        }
        Ok(&self.stages[from..to])
    }
}
