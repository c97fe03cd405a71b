//! The migration execution tool and its loader.
//!
//! [`MigrationTool`] is the seam between the [`super::Migrator`] and whatever actually executes migrations. The
//! shipped implementation runs the SQL migration units found in the migrations directory through sqlx's migration
//! bookkeeping (`_sqlx_migrations` table), connecting with the parameters in the [`MigrationConfig`].
use std::sync::Arc;

use async_trait::async_trait;
use log::*;

use super::{config::MigrationConfig, unit::MigrationUnit};
use crate::StorageError;

#[async_trait]
pub trait MigrationTool: Send + Sync {
    /// Returns `true` when every local migration unit has been applied.
    async fn check(&self) -> Result<bool, StorageError>;

    /// Migrates up or down until the schema is at `target`, a migration name or bare 14-digit prefix.
    async fn sync(&self, target: &str) -> Result<(), StorageError>;
}

/// Creates a [`MigrationTool`] for a configuration. Failure means "no migration capability" and is handled by the
/// caller, not propagated.
#[async_trait]
pub trait ToolLoader: Send + Sync {
    async fn load(&self, config: &MigrationConfig) -> Result<Arc<dyn MigrationTool>, StorageError>;
}

/// Loads the sqlx-backed migration tool for relational configurations.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlxToolLoader;

#[async_trait]
impl ToolLoader for SqlxToolLoader {
    async fn load(&self, config: &MigrationConfig) -> Result<Arc<dyn MigrationTool>, StorageError> {
        if config.is_noop() {
            return Err(StorageError::MigrationToolUnavailable("there is no migration configuration".into()));
        }
        let dir = config.migrations_dir().ok_or_else(|| {
            StorageError::MigrationToolUnavailable("the migrations directory is not configured".into())
        })?;
        let source = sqlx::migrate::Migrator::new(dir.to_path_buf()).await.map_err(|e| {
            StorageError::MigrationToolUnavailable(format!("could not read migrations from {}: {e}", dir.display()))
        })?;
        let units = MigrationUnit::from_migrations(source.iter());
        debug!("🧬️ Loaded {} migration units from {}", units.len(), dir.display());
        let tool = sqlx_tool::SqlxMigrationTool::new(config, units)?;
        Ok(Arc::new(tool))
    }
}

mod sqlx_tool {
    #[cfg(feature = "postgres")]
    use sqlx::postgres::PgConnectOptions;
    #[cfg(feature = "sqlite")]
    use sqlx::sqlite::SqliteConnectOptions;
    #[cfg(any(feature = "sqlite", feature = "postgres"))]
    use sqlx::{migrate::Migrate, ConnectOptions, Connection};

    use super::*;
    use crate::migrations::{
        config::ConnectionParams,
        schema_sync::{pending_versions, sync_schema},
        unit::{parse_version, SqlxSchema},
    };

    enum Target {
        #[cfg(feature = "sqlite")]
        Sqlite(SqliteConnectOptions),
        #[cfg(feature = "postgres")]
        Postgres(PgConnectOptions),
    }

    pub struct SqlxMigrationTool {
        units: Vec<MigrationUnit>,
        target: Target,
    }

    impl SqlxMigrationTool {
        pub fn new(config: &MigrationConfig, units: Vec<MigrationUnit>) -> Result<Self, StorageError> {
            let target = match (config.driver(), config.connection()) {
                #[cfg(feature = "sqlite")]
                (Some("sqlite3"), ConnectionParams::File { filename }) => {
                    Target::Sqlite(SqliteConnectOptions::new().filename(filename).create_if_missing(true))
                },
                #[cfg(feature = "postgres")]
                (Some("pg"), ConnectionParams::Server { user, password, host, port, database }) => {
                    let mut options = PgConnectOptions::new()
                        .host(host)
                        .username(user)
                        .password(password.reveal())
                        .database(database);
                    if let Some(port) = port {
                        options = options.port(*port);
                    }
                    Target::Postgres(options)
                },
                (driver, _) => {
                    return Err(StorageError::MigrationToolUnavailable(format!(
                        "support for the {} driver was not compiled in",
                        driver.unwrap_or("unknown")
                    )));
                },
            };
            Ok(Self { units, target })
        }
    }

    #[cfg(any(feature = "sqlite", feature = "postgres"))]
    async fn check_with<C: Migrate + Send + ?Sized>(conn: &mut C, units: &[MigrationUnit]) -> Result<bool, StorageError> {
        let mut schema = SqlxSchema::new(conn);
        let pending = pending_versions(&mut schema, units).await?;
        if !pending.is_empty() {
            info!("🧬️ {} migrations are pending: {pending:?}", pending.len());
        }
        Ok(pending.is_empty())
    }

    #[cfg(any(feature = "sqlite", feature = "postgres"))]
    async fn sync_with<C: Migrate + Send + ?Sized>(
        conn: &mut C,
        units: &[MigrationUnit],
        target: i64,
    ) -> Result<(), StorageError> {
        let mut schema = SqlxSchema::new(conn);
        let steps = sync_schema(&mut schema, units, target).await?;
        info!("🧬️ Schema synced to {target} in {steps} steps");
        Ok(())
    }

    #[async_trait]
    impl MigrationTool for SqlxMigrationTool {
        async fn check(&self) -> Result<bool, StorageError> {
            match self.target {
                #[cfg(feature = "sqlite")]
                Target::Sqlite(ref options) => {
                    let mut conn = options.connect().await?;
                    let result = check_with(&mut conn, &self.units).await;
                    conn.close().await?;
                    result
                },
                #[cfg(feature = "postgres")]
                Target::Postgres(ref options) => {
                    let mut conn = options.connect().await?;
                    let result = check_with(&mut conn, &self.units).await;
                    conn.close().await?;
                    result
                },
            }
        }

        async fn sync(&self, target: &str) -> Result<(), StorageError> {
            let version = parse_version(target)?;
            match self.target {
                #[cfg(feature = "sqlite")]
                Target::Sqlite(ref options) => {
                    let mut conn = options.connect().await?;
                    let result = sync_with(&mut conn, &self.units, version).await;
                    conn.close().await?;
                    result
                },
                #[cfg(feature = "postgres")]
                Target::Postgres(ref options) => {
                    let mut conn = options.connect().await?;
                    let result = sync_with(&mut conn, &self.units, version).await;
                    conn.close().await?;
                    result
                },
            }
        }
    }
}
