//! Builds the migration tool configuration for a connection string.
//!
//! Only relational protocols can be migrated. Every other protocol gets a no-op configuration, which the tool
//! loader treats as "no migration tool available".
use std::path::{Path, PathBuf};

use log::*;
use pcs_common::Secret;

use crate::{
    connection::{ConnectionDescriptor, Protocol},
    StorageError,
};

pub const DEFAULT_MIGRATIONS_ROOT: &str = "./migrations";

/// Migration tool driver identifiers, keyed by protocol.
const DRIVERS: [(Protocol, &str); 2] = [(Protocol::Postgresql, "pg"), (Protocol::Sqlite, "sqlite3")];

pub fn driver_for(protocol: Protocol) -> Option<&'static str> {
    DRIVERS.iter().find(|(p, _)| *p == protocol).map(|(_, driver)| *driver)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionParams {
    None,
    File {
        filename: String,
    },
    Server {
        user: String,
        password: Secret<String>,
        host: String,
        port: Option<u16>,
        database: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    protocol: Option<Protocol>,
    driver: Option<&'static str>,
    connection: ConnectionParams,
    migrations_dir: Option<PathBuf>,
}

/// Derives the migration configuration for `connection_url`, using [`DEFAULT_MIGRATIONS_ROOT`] as the migrations
/// root. Protocols that cannot be migrated produce [`MigrationConfig::noop`]; only malformed connection strings are
/// errors.
pub fn generate_config_object(connection_url: &str) -> Result<MigrationConfig, StorageError> {
    let descriptor = ConnectionDescriptor::parse(connection_url)?;
    let config = MigrationConfig::from_descriptor(&descriptor, DEFAULT_MIGRATIONS_ROOT);
    if config.is_noop() {
        debug!("🧬️ {} databases have no schema migrations", descriptor.protocol());
    }
    Ok(config)
}

impl MigrationConfig {
    pub fn noop() -> Self {
        Self { protocol: None, driver: None, connection: ConnectionParams::None, migrations_dir: None }
    }

    pub fn from_descriptor<P: AsRef<Path>>(descriptor: &ConnectionDescriptor, migrations_root: P) -> Self {
        let protocol = descriptor.protocol();
        let connection = match protocol {
            Protocol::Sqlite => ConnectionParams::File { filename: descriptor.body().to_string() },
            Protocol::Postgresql => ConnectionParams::Server {
                user: descriptor.user().unwrap_or_default().to_string(),
                password: descriptor.password().cloned().unwrap_or_default(),
                host: descriptor.host().unwrap_or_default().to_string(),
                port: descriptor.port(),
                database: descriptor.database().unwrap_or_default().to_string(),
            },
            Protocol::Nedb | Protocol::Mongo => return Self::noop(),
        };
        Self {
            protocol: Some(protocol),
            driver: driver_for(protocol),
            connection,
            migrations_dir: Some(migrations_root.as_ref().join(protocol.as_str())),
        }
    }

    /// Moves the migrations directory under a different root, keeping the per-protocol sub-directory.
    pub fn with_migrations_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        if let Some(protocol) = self.protocol {
            self.migrations_dir = Some(root.as_ref().join(protocol.as_str()));
        }
        self
    }

    pub fn is_noop(&self) -> bool {
        self.driver.is_none()
    }

    pub fn protocol(&self) -> Option<Protocol> {
        self.protocol
    }

    pub fn driver(&self) -> Option<&'static str> {
        self.driver
    }

    pub fn connection(&self) -> &ConnectionParams {
        &self.connection
    }

    pub fn migrations_dir(&self) -> Option<&Path> {
        self.migrations_dir.as_deref()
    }
}
