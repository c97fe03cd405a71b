use std::sync::Arc;

use async_trait::async_trait;

use super::{ChannelContract, DatasetAccessors, Engine};
use crate::{config::EngineSettings, connection::ConnectionDescriptor, db_types::Namespace, StorageError};

/// Opens one backend family.
#[async_trait]
pub trait BackendFactory: Send + Sync {
    /// A short name for the family, used in log messages.
    fn family(&self) -> &'static str;

    /// Opens the engine for `descriptor`. No dataset accessors are built at this stage.
    async fn open(
        &self,
        descriptor: &ConnectionDescriptor,
        settings: &EngineSettings,
    ) -> Result<Box<dyn Backend>, StorageError>;
}

/// An opened engine, ready to have dataset accessors built over it.
pub trait Backend: Send + Sync {
    fn engine(&self) -> Arc<dyn Engine>;

    fn datasets(&self, namespace: &Namespace, contract: Arc<dyn ChannelContract>) -> DatasetAccessors;
}
