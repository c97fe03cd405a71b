use async_trait::async_trait;
use futures_util::future::try_join_all;
use log::*;

use super::ChannelContract;
use crate::{
    db_types::{Amount, ChannelId, ChannelState, Payment, PaymentChannel},
    StorageError,
};

/// Redeemed payment tokens.
#[async_trait]
pub trait TokensDatabase: Send + Sync {
    async fn save(&self, token: &str, channel_id: &ChannelId) -> Result<(), StorageError>;

    async fn is_present(&self, token: &str) -> Result<bool, StorageError>;

    async fn delete_by_channel_id(&self, channel_id: &ChannelId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait PaymentsDatabase: Send + Sync {
    /// Stores a payment, tagged with the token it was redeemed for.
    async fn save(&self, token: &str, payment: &Payment) -> Result<(), StorageError>;

    /// The payment with the highest cumulative value in the channel, i.e. the most recent one.
    async fn first_maximum(&self, channel_id: &ChannelId) -> Result<Option<Payment>, StorageError>;

    async fn find_by_token(&self, token: &str) -> Result<Option<Payment>, StorageError>;

    /// All payments in the channel, in ascending order of value.
    async fn find_by_channel_id(&self, channel_id: &ChannelId) -> Result<Vec<Payment>, StorageError>;

    async fn delete_by_channel_id(&self, channel_id: &ChannelId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait ChannelsDatabase: Send + Sync {
    /// The channel contract this accessor consults for on-chain channel state.
    fn contract(&self) -> &dyn ChannelContract;

    async fn save(&self, channel: &PaymentChannel) -> Result<(), StorageError>;

    /// Inserts the channel, or replaces the stored values if a channel with the same id exists.
    async fn save_or_update(&self, channel: &PaymentChannel) -> Result<(), StorageError>;

    async fn first_by_id(&self, channel_id: &ChannelId) -> Result<Option<PaymentChannel>, StorageError>;

    /// Sets the spent amount of a channel. Fails with [`StorageError::RecordNotFound`] for unknown channels.
    async fn spend(&self, channel_id: &ChannelId, spent: Amount) -> Result<(), StorageError>;

    /// Fails with [`StorageError::RecordNotFound`] for unknown channels.
    async fn update_state(&self, channel_id: &ChannelId, state: ChannelState) -> Result<(), StorageError>;

    async fn all(&self) -> Result<Vec<PaymentChannel>, StorageError>;

    async fn find_by_sender_receiver(&self, sender: &str, receiver: &str) -> Result<Vec<PaymentChannel>, StorageError>;

    async fn delete_by_id(&self, channel_id: &ChannelId) -> Result<(), StorageError>;

    /// Channels that are open according to the channel contract. Stored states that have drifted from the
    /// on-chain state are updated along the way.
    async fn all_open(&self) -> Result<Vec<PaymentChannel>, StorageError> {
        let stored = self.all().await?.into_iter().filter(|c| c.state == ChannelState::Open).collect::<Vec<_>>();
        let refreshed = refresh_channel_states(self.contract(), stored).await?;
        let mut open = Vec::with_capacity(refreshed.len());
        for (channel, changed) in refreshed {
            if changed {
                debug!("🗃️ Channel {} is now {} on chain", channel.channel_id, channel.state);
                self.update_state(&channel.channel_id, channel.state).await?;
            }
            if channel.state == ChannelState::Open {
                open.push(channel);
            }
        }
        Ok(open)
    }
}

/// The three dataset accessors of a storage backend.
pub struct DatasetAccessors {
    pub tokens: Box<dyn TokensDatabase>,
    pub payments: Box<dyn PaymentsDatabase>,
    pub channels: Box<dyn ChannelsDatabase>,
}

/// Fetches the on-chain state of every channel. Each channel is returned with its current state and a flag that is
/// set if the state differs from the one it was passed in with.
pub async fn refresh_channel_states(
    contract: &dyn ChannelContract,
    channels: Vec<PaymentChannel>,
) -> Result<Vec<(PaymentChannel, bool)>, StorageError> {
    let states = try_join_all(channels.iter().map(|c| contract.channel_state(&c.channel_id))).await?;
    let refreshed = channels
        .into_iter()
        .zip(states)
        .map(|(mut channel, state)| {
            let changed = channel.state != state;
            channel.state = state;
            (channel, changed)
        })
        .collect();
    Ok(refreshed)
}
