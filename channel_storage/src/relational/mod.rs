//! Relational storage: SQLite and PostgreSQL.
//!
//! Both databases share one implementation over sqlx's `Any` driver. The engine owns a lazily connected pool and
//! a [`Migrator`] configured for the protocol, so relational storage is always subject to the migration gate.
mod accessors;
pub mod db;

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use log::*;
use sqlx::{any::AnyPoolOptions, AnyPool};

pub use accessors::{SqlChannels, SqlPayments, SqlTokens};

use crate::{
    config::EngineSettings,
    connection::{ConnectionDescriptor, Protocol},
    db_types::Namespace,
    migrations::{MigrationConfig, Migrator, SqlxToolLoader},
    traits::{Backend, BackendFactory, ChannelContract, DatasetAccessors, Engine},
    StorageError,
};

#[derive(Clone)]
pub struct RelationalEngine {
    protocol: Protocol,
    pool: AnyPool,
    migrator: Arc<Migrator>,
}

impl RelationalEngine {
    /// Creates the engine for `descriptor`. No connection is made until the pool is first used.
    pub fn new(descriptor: &ConnectionDescriptor, settings: &EngineSettings) -> Result<Self, StorageError> {
        let protocol = descriptor.protocol();
        if !protocol.is_relational() {
            return Err(StorageError::UnsupportedProtocol(protocol.to_string()));
        }
        sqlx::any::install_default_drivers();
        let url = pool_url(descriptor);
        let pool = AnyPoolOptions::new().max_connections(settings.max_connections).connect_lazy(&url)?;
        let config = MigrationConfig::from_descriptor(descriptor, &settings.migrations_root);
        let migrator = Migrator::new(config, Arc::new(SqlxToolLoader), settings.timeouts);
        Ok(Self { protocol, pool, migrator: Arc::new(migrator) })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

/// SQLite databases are created on first use, as the migration tool does for its own connections.
fn pool_url(descriptor: &ConnectionDescriptor) -> String {
    let url = descriptor.url().to_string();
    match descriptor.protocol() {
        Protocol::Sqlite if descriptor.param("mode").is_none() => {
            let separator = if url.contains('?') { '&' } else { '?' };
            format!("{url}{separator}mode=rwc")
        },
        _ => url,
    }
}

impl Debug for RelationalEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RelationalEngine ({}, {:?})", self.protocol, self.migrator)
    }
}

#[async_trait]
impl Engine for RelationalEngine {
    fn protocol(&self) -> Protocol {
        self.protocol
    }

    fn migrator(&self) -> Option<Arc<Migrator>> {
        Some(Arc::clone(&self.migrator))
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.pool.close().await;
        Ok(())
    }
}

impl Backend for RelationalEngine {
    fn engine(&self) -> Arc<dyn Engine> {
        Arc::new(self.clone())
    }

    fn datasets(&self, namespace: &Namespace, contract: Arc<dyn ChannelContract>) -> DatasetAccessors {
        DatasetAccessors {
            tokens: Box::new(SqlTokens::new(self.pool.clone(), namespace.clone())),
            payments: Box::new(SqlPayments::new(self.pool.clone(), namespace.clone())),
            channels: Box::new(SqlChannels::new(self.pool.clone(), namespace.clone(), contract)),
        }
    }
}

/// Opens [`RelationalEngine`]s for the `sqlite` and `postgresql` protocols.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelationalFactory;

#[async_trait]
impl BackendFactory for RelationalFactory {
    fn family(&self) -> &'static str {
        "relational"
    }

    async fn open(
        &self,
        descriptor: &ConnectionDescriptor,
        settings: &EngineSettings,
    ) -> Result<Box<dyn Backend>, StorageError> {
        let engine = RelationalEngine::new(descriptor, settings)?;
        debug!("🗃️ Created {} engine with up to {} connections", engine.protocol, settings.max_connections);
        Ok(Box::new(engine))
    }
}
