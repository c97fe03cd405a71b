use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;

use crate::{connection::Protocol, migrations::Migrator, StorageError};

/// An opaque, per-backend connection handle.
#[async_trait]
pub trait Engine: Debug + Send + Sync {
    fn protocol(&self) -> Protocol;

    /// The schema migration capability. Only relational engines have one.
    fn migrator(&self) -> Option<Arc<Migrator>>;

    /// Releases the engine's connections.
    async fn close(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
