//! Freshness checks and target-driven synchronisation of a schema against a set of migration units.
use std::collections::{BTreeMap, BTreeSet};

use log::*;
use sqlx::migrate::MigrateError;

use super::unit::{MigrationUnit, SchemaHandle};
use crate::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    Apply(i64),
    Revert(i64),
}

/// Works out the steps that take a schema with the `applied` versions to exactly `target`: applied units newer than
/// the target are reverted newest first, then pending units up to and including the target are applied oldest first.
///
/// `units` must be sorted by version.
pub fn plan_sync(units: &[MigrationUnit], applied: &BTreeSet<i64>, target: i64) -> Vec<SyncStep> {
    let reverts = units
        .iter()
        .rev()
        .filter(|u| u.version() > target && applied.contains(&u.version()))
        .map(|u| SyncStep::Revert(u.version()));
    let applies = units
        .iter()
        .filter(|u| u.version() <= target && !applied.contains(&u.version()))
        .map(|u| SyncStep::Apply(u.version()));
    reverts.chain(applies).collect()
}

/// Returns the versions of local units that have not been applied yet. Applied migrations whose checksum no longer
/// matches the local script are reported as [`MigrateError::VersionMismatch`].
pub async fn pending_versions<H: SchemaHandle + ?Sized>(
    schema: &mut H,
    units: &[MigrationUnit],
) -> Result<Vec<i64>, StorageError> {
    schema.prepare().await?;
    let applied = schema.applied().await?;
    let local = units.iter().map(|u| (u.version(), u)).collect::<BTreeMap<_, _>>();
    for migration in &applied {
        match local.get(&migration.version) {
            Some(unit) if unit.checksum() != migration.checksum.as_ref() => {
                return Err(MigrateError::VersionMismatch(migration.version).into());
            },
            Some(_) => {},
            None => warn!("🧬️ Migration {} has been applied, but is not available locally", migration.version),
        }
    }
    let applied = applied.into_iter().map(|m| m.version).collect::<BTreeSet<_>>();
    Ok(units.iter().map(MigrationUnit::version).filter(|v| !applied.contains(v)).collect())
}

/// Migrates the schema up or down to `target`, holding the migration lock for the duration. Returns the number of
/// steps executed. The first failing step aborts the sync and its error is returned as is.
pub async fn sync_schema<H: SchemaHandle + ?Sized>(
    schema: &mut H,
    units: &[MigrationUnit],
    target: i64,
) -> Result<usize, StorageError> {
    schema.prepare().await?;
    schema.lock().await?;
    let result = run_steps(schema, units, target).await;
    let unlocked = schema.unlock().await;
    match (result, unlocked) {
        (Ok(steps), unlocked) => unlocked.map(|_| steps),
        (Err(e), Err(unlock_err)) => {
            warn!("🧬️ Could not release the migration lock after a failed sync. {unlock_err}");
            Err(e)
        },
        (Err(e), Ok(())) => Err(e),
    }
}

async fn run_steps<H: SchemaHandle + ?Sized>(
    schema: &mut H,
    units: &[MigrationUnit],
    target: i64,
) -> Result<usize, StorageError> {
    let applied = schema.applied().await?.into_iter().map(|m| m.version).collect::<BTreeSet<_>>();
    let steps = plan_sync(units, &applied, target);
    if steps.is_empty() {
        debug!("🧬️ Schema is already at {target}");
        return Ok(0);
    }
    let by_version = units.iter().map(|u| (u.version(), u)).collect::<BTreeMap<_, _>>();
    for step in &steps {
        match step {
            SyncStep::Apply(v) => {
                let unit = by_version[v];
                info!("🧬️ Applying migration {}", unit.name());
                unit.up(schema).await?;
            },
            SyncStep::Revert(v) => {
                let unit = by_version[v];
                info!("🧬️ Reverting migration {}", unit.name());
                unit.down(schema).await?;
            },
        }
    }
    Ok(steps.len())
}
