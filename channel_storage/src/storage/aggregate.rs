use std::{fmt::Debug, sync::Arc};

use log::*;
use tokio::task::JoinHandle;

use crate::{
    db_types::Namespace,
    migrations::Migrator,
    traits::{ChannelsDatabase, Engine, PaymentsDatabase, TokensDatabase},
    StorageError,
};

/// Handle of a schema sync running in the background.
pub struct SyncHandle {
    task: JoinHandle<Result<(), StorageError>>,
}

impl SyncHandle {
    /// Starts syncing the schema to the latest local migration on a new task.
    pub(crate) fn spawn(migrator: Arc<Migrator>) -> Self {
        let task = tokio::spawn(async move {
            let result = migrator.sync(None).await;
            match &result {
                Ok(()) => debug!("🧬️ Background schema sync complete"),
                Err(e) => error!("🧬️ Background schema sync failed. {e}"),
            }
            result
        });
        Self { task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the sync to complete and returns its outcome.
    pub async fn wait(self) -> Result<(), StorageError> {
        self.task.await.map_err(|e| StorageError::SyncTaskFailed(e.to_string()))?
    }

    pub fn abort(&self) {
        self.task.abort();
    }
}

impl Debug for SyncHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SyncHandle (finished: {})", self.task.is_finished())
    }
}

/// The storage facade: one engine plus the token, payment and channel accessors built over it, all scoped to the
/// same namespace.
pub struct Storage {
    engine: Arc<dyn Engine>,
    tokens: Box<dyn TokensDatabase>,
    payments: Box<dyn PaymentsDatabase>,
    channels: Box<dyn ChannelsDatabase>,
    namespace: Namespace,
    pending_sync: Option<SyncHandle>,
}

impl Storage {
    pub(crate) fn new(
        engine: Arc<dyn Engine>,
        tokens: Box<dyn TokensDatabase>,
        payments: Box<dyn PaymentsDatabase>,
        channels: Box<dyn ChannelsDatabase>,
        namespace: Namespace,
        pending_sync: Option<SyncHandle>,
    ) -> Self {
        Self { engine, tokens, payments, channels, namespace, pending_sync }
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    pub fn tokens(&self) -> &dyn TokensDatabase {
        self.tokens.as_ref()
    }

    pub fn payments(&self) -> &dyn PaymentsDatabase {
        self.payments.as_ref()
    }

    pub fn channels(&self) -> &dyn ChannelsDatabase {
        self.channels.as_ref()
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn has_pending_sync(&self) -> bool {
        self.pending_sync.is_some()
    }

    /// Takes the handle of the schema sync started when this storage was built, if there was one. The caller can
    /// await it to learn when the schema is current.
    pub fn take_pending_sync(&mut self) -> Option<SyncHandle> {
        self.pending_sync.take()
    }

    /// Releases the engine. A schema sync that is still running is allowed to finish first.
    pub async fn close(mut self) -> Result<(), StorageError> {
        if let Some(sync) = self.pending_sync.take() {
            if let Err(e) = sync.wait().await {
                warn!("🗃️ The schema sync did not complete before the storage was closed. {e}");
            }
        }
        self.engine.close().await?;
        debug!("🗃️ {} storage closed", self.engine.protocol());
        Ok(())
    }
}

impl Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("engine", &self.engine)
            .field("namespace", &self.namespace)
            .field("pending_sync", &self.pending_sync)
            .finish()
    }
}
