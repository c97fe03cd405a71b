use async_trait::async_trait;

use crate::{
    db_types::{ChannelId, ChannelState},
    StorageError,
};

/// The on-chain payment channel contract. Channel accessors consult it to find out whether a stored channel is
/// still open.
#[async_trait]
pub trait ChannelContract: Send + Sync {
    async fn channel_state(&self, channel_id: &ChannelId) -> Result<ChannelState, StorageError>;
}
