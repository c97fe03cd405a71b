//! Schema migration governance for relational engines.
//!
//! The [`Migrator`] loads its migration tool lazily, the first time any operation needs it. Loading happens at most
//! once: concurrent callers wait for the same initialisation, and the outcome is kept for the lifetime of the
//! migrator. If the tool cannot be loaded, the migrator runs in degraded mode: the schema is reported as current and
//! syncs do nothing. This lets document-store deployments, which have no migration tooling at all, share the same
//! code path.
use std::{collections::BTreeSet, path::Path, sync::Arc, time::Duration};

use log::*;
use tokio::{sync::OnceCell, time::timeout};

use super::{
    config::MigrationConfig,
    tool::{MigrationTool, ToolLoader},
    unit::migration_prefix,
};
use crate::StorageError;

const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(300);

const UNAVAILABLE_WARNING: &str = "🧬️ The migration tool is not available, so schema migrations are disabled. This is \
                                   expected when running against a document store.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationTimeouts {
    pub init: Duration,
    pub check: Duration,
    pub sync: Duration,
}

impl Default for MigrationTimeouts {
    fn default() -> Self {
        Self { init: DEFAULT_INIT_TIMEOUT, check: DEFAULT_CHECK_TIMEOUT, sync: DEFAULT_SYNC_TIMEOUT }
    }
}

pub struct Migrator {
    config: MigrationConfig,
    loader: Arc<dyn ToolLoader>,
    timeouts: MigrationTimeouts,
    tool: OnceCell<Option<Arc<dyn MigrationTool>>>,
}

impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.tool.get() {
            None => "uninitialised",
            Some(None) => "unavailable",
            Some(Some(_)) => "ready",
        };
        f.debug_struct("Migrator").field("config", &self.config).field("state", &state).finish()
    }
}

impl Migrator {
    pub fn new(config: MigrationConfig, loader: Arc<dyn ToolLoader>, timeouts: MigrationTimeouts) -> Self {
        Self { config, loader, timeouts, tool: OnceCell::new() }
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub fn migrations_dir(&self) -> Option<&Path> {
        self.config.migrations_dir()
    }

    /// Loads the migration tool if that has not happened yet and returns it, or `None` if it is unavailable.
    pub async fn ensure_init(&self) -> Option<Arc<dyn MigrationTool>> {
        self.tool
            .get_or_init(|| async {
                trace!("🧬️ Initialising the migration tool");
                match timeout(self.timeouts.init, self.loader.load(&self.config)).await {
                    Ok(Ok(tool)) => {
                        debug!("🧬️ Migration tool initialised");
                        Some(tool)
                    },
                    Ok(Err(e)) => {
                        warn!("🧬️ Could not initialise the migration tool. {e}");
                        None
                    },
                    Err(_) => {
                        warn!("🧬️ Migration tool initialisation timed out after {:?}", self.timeouts.init);
                        None
                    },
                }
            })
            .await
            .clone()
    }

    pub async fn is_available(&self) -> bool {
        self.ensure_init().await.is_some()
    }

    /// Returns `true` when there are no pending migrations. Without a migration tool, there is nothing that could be
    /// pending, so this is also `true`.
    pub async fn is_latest(&self) -> Result<bool, StorageError> {
        let Some(tool) = self.ensure_init().await else {
            warn!("{UNAVAILABLE_WARNING}");
            return Ok(true);
        };
        timeout(self.timeouts.check, tool.check())
            .await
            .map_err(|_| StorageError::Timeout { operation: "Schema freshness check", after: self.timeouts.check })?
    }

    /// Lists the migration units in the migrations directory, without extensions, in ascending order.
    /// Sub-directories and dot-files are skipped.
    pub async fn retrieve_in_folder_migration_list(&self) -> Result<Vec<String>, StorageError> {
        let Some(dir) = self.config.migrations_dir() else {
            return Ok(Vec::new());
        };
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut names = BTreeSet::new();
        while let Some(entry) = entries.next_entry().await? {
            if tokio::fs::metadata(entry.path()).await?.is_dir() {
                continue;
            }
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            let name = file_name.split_once('.').map(|(stem, _)| stem).unwrap_or(&file_name);
            if !name.is_empty() {
                names.insert(name.to_string());
            }
        }
        Ok(names.into_iter().collect())
    }

    /// Migrates the schema to `target`. Without a target, the schema is brought up to the newest local migration.
    pub async fn sync(&self, target: Option<&str>) -> Result<(), StorageError> {
        let Some(tool) = self.ensure_init().await else {
            warn!("{UNAVAILABLE_WARNING}");
            return Ok(());
        };
        let target = match target {
            Some(t) => t.to_string(),
            None => {
                let local = self.retrieve_in_folder_migration_list().await?;
                match local.last() {
                    Some(last) => migration_prefix(last).to_string(),
                    None => {
                        info!("🧬️ There are no local migrations. Nothing to sync.");
                        return Ok(());
                    },
                }
            },
        };
        info!("🧬️ Syncing schema to {target}");
        timeout(self.timeouts.sync, tool.sync(&target))
            .await
            .map_err(|_| StorageError::Timeout { operation: "Schema sync", after: self.timeouts.sync })?
    }
}
