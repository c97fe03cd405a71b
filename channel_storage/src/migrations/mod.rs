//! Schema migration governance for relational backends.
//!
//! * [`config`] derives the migration tool configuration from a connection string.
//! * [`unit`] defines migration units and the schema handle they run against.
//! * [`schema_sync`] checks freshness and plans/executes syncs to a target version.
//! * [`tool`] holds the migration tool seam and its sqlx implementation.
//! * [`Migrator`] ties these together and gates storage construction.
pub mod config;
mod migrator;
pub mod schema_sync;
pub mod tool;
pub mod unit;

pub use config::{generate_config_object, ConnectionParams, MigrationConfig, DEFAULT_MIGRATIONS_ROOT};
pub use migrator::{MigrationTimeouts, Migrator};
pub use tool::{MigrationTool, SqlxToolLoader, ToolLoader};
pub use unit::{migration_prefix, MigrationUnit, SchemaHandle, MIGRATION_PREFIX_LEN};
