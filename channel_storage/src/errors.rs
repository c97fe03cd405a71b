use std::time::Duration;

use sqlx::migrate::MigrateError;
use thiserror::Error;

use crate::connection::Protocol;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Unsupported database protocol: {0}")]
    UnsupportedProtocol(String),
    #[error("Invalid connection url: {0}")]
    InvalidConnectionUrl(String),
    #[error("No storage backend has been registered for the '{0}' protocol")]
    BackendNotRegistered(Protocol),
    #[error("There are non-applied db-migrations!")]
    MigrationsPending,
    #[error("The migration tool is not available: {0}")]
    MigrationToolUnavailable(String),
    #[error("Invalid migration name: {0}")]
    InvalidMigrationName(String),
    #[error("Migration {0} has no down script and cannot be reverted")]
    IrreversibleMigration(String),
    #[error("{operation} did not complete within {after:?}")]
    Timeout { operation: &'static str, after: Duration },
    #[error("The background schema sync task failed: {0}")]
    SyncTaskFailed(String),
    #[error("Database driver error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    MigrateError(#[from] MigrateError),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Could not (de)serialize a record: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid record in the database: {0}")]
    InvalidRecord(String),
    #[error("Record not found: {0}")]
    RecordNotFound(String),
    #[error("Channel contract error: {0}")]
    ContractError(String),
}
