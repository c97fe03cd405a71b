use std::sync::Arc;

use log::*;

use super::{aggregate::SyncHandle, MigratePolicy, Storage, SyncMode};
use crate::{
    config::StorageSettings,
    connection::ConnectionDescriptor,
    migrations::Migrator,
    traits::{ChannelContract, DatasetAccessors, Engine},
    BackendRegistry,
    StorageError,
};

/// Builds [`Storage`] instances for connection strings.
#[derive(Debug, Clone, Default)]
pub struct StorageFactory {
    registry: BackendRegistry,
    settings: StorageSettings,
}

impl StorageFactory {
    pub fn new(registry: BackendRegistry, settings: StorageSettings) -> Self {
        Self { registry, settings }
    }

    pub fn with_settings(settings: StorageSettings) -> Self {
        Self::new(BackendRegistry::default(), settings)
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &StorageSettings {
        &self.settings
    }

    /// Builds the storage for `connection_url`.
    ///
    /// Only the backend family registered for the URL's protocol is opened. If its engine can be migrated and the
    /// schema is behind the local migrations, `policy` decides what happens: [`MigratePolicy::Raise`] fails the build
    /// with [`StorageError::MigrationsPending`], otherwise a sync to the latest migration is started. In
    /// [`SyncMode::Background`] the build does not wait for that sync; its handle is kept in the returned storage.
    ///
    /// The default registry has no factory for `mongo://`, so those URLs fail with
    /// [`StorageError::BackendNotRegistered`] until one is added with [`BackendRegistry::register`] or
    /// [`BackendRegistry::with`].
    pub async fn build(
        &self,
        connection_url: &str,
        contract: Arc<dyn ChannelContract>,
        policy: Option<MigratePolicy>,
    ) -> Result<Storage, StorageError> {
        let descriptor = ConnectionDescriptor::parse(connection_url)?;
        let protocol = descriptor.protocol();
        let factory = self.registry.get(protocol).ok_or(StorageError::BackendNotRegistered(protocol))?;
        debug!("🗃️ Opening {} engine for {protocol}", factory.family());
        let backend = factory.open(&descriptor, &self.settings.engine).await?;
        let engine = backend.engine();
        let pending_sync = match engine.migrator() {
            Some(migrator) => match self.migration_gate(migrator, policy).await {
                Ok(handle) => handle,
                Err(e) => {
                    close_quietly(engine.as_ref()).await;
                    return Err(e);
                },
            },
            None => None,
        };
        let namespace = self.settings.namespace.clone();
        let DatasetAccessors { tokens, payments, channels } = backend.datasets(&namespace, contract);
        info!("🗃️ {protocol} storage is ready in namespace '{namespace}'");
        Ok(Storage::new(engine, tokens, payments, channels, namespace, pending_sync))
    }

    async fn migration_gate(
        &self,
        migrator: Arc<Migrator>,
        policy: Option<MigratePolicy>,
    ) -> Result<Option<SyncHandle>, StorageError> {
        if migrator.is_latest().await? {
            trace!("🧬️ Schema is up to date");
            return Ok(None);
        }
        match (policy.unwrap_or_default(), self.settings.sync_mode) {
            (MigratePolicy::Raise, _) => {
                error!("🧬️ The schema is behind the local migrations and the migrate policy is 'raise'");
                Err(StorageError::MigrationsPending)
            },
            (MigratePolicy::Silent, SyncMode::Blocking) => {
                info!("🧬️ Schema is behind the local migrations. Syncing to the latest migration.");
                migrator.sync(None).await?;
                Ok(None)
            },
            (MigratePolicy::Silent, SyncMode::Background) => {
                info!("🧬️ Schema is behind the local migrations. Syncing to the latest migration in the background.");
                Ok(Some(SyncHandle::spawn(migrator)))
            },
        }
    }
}

async fn close_quietly(engine: &dyn Engine) {
    if let Err(e) = engine.close().await {
        warn!("🗃️ Could not close the {} engine. {e}", engine.protocol());
    }
}
