use std::sync::Arc;

use async_trait::async_trait;
use log::*;
use sqlx::AnyPool;

use super::db::{channels, payments, tokens};
use crate::{
    db_types::{Amount, ChannelId, ChannelState, Namespace, Payment, PaymentChannel},
    traits::{ChannelContract, ChannelsDatabase, PaymentsDatabase, TokensDatabase},
    StorageError,
};

pub struct SqlTokens {
    pool: AnyPool,
    namespace: Namespace,
}

impl SqlTokens {
    pub fn new(pool: AnyPool, namespace: Namespace) -> Self {
        Self { pool, namespace }
    }
}

#[async_trait]
impl TokensDatabase for SqlTokens {
    async fn save(&self, token: &str, channel_id: &ChannelId) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await?;
        tokens::insert_token(self.namespace.as_str(), token, channel_id, &mut conn).await
    }

    async fn is_present(&self, token: &str) -> Result<bool, StorageError> {
        let mut conn = self.pool.acquire().await?;
        tokens::token_exists(self.namespace.as_str(), token, &mut conn).await
    }

    async fn delete_by_channel_id(&self, channel_id: &ChannelId) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await?;
        let count = tokens::delete_tokens_for_channel(self.namespace.as_str(), channel_id, &mut conn).await?;
        debug!("🗃️ Deleted {count} tokens for channel {channel_id}");
        Ok(())
    }
}

pub struct SqlPayments {
    pool: AnyPool,
    namespace: Namespace,
}

impl SqlPayments {
    pub fn new(pool: AnyPool, namespace: Namespace) -> Self {
        Self { pool, namespace }
    }
}

#[async_trait]
impl PaymentsDatabase for SqlPayments {
    async fn save(&self, token: &str, payment: &Payment) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await?;
        payments::insert_payment(self.namespace.as_str(), token, payment, &mut conn).await?;
        debug!("🗃️ Payment of {} in channel {} saved", payment.price, payment.channel_id);
        Ok(())
    }

    async fn first_maximum(&self, channel_id: &ChannelId) -> Result<Option<Payment>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_max_payment(self.namespace.as_str(), channel_id, &mut conn).await
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Payment>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payment_by_token(self.namespace.as_str(), token, &mut conn).await
    }

    async fn find_by_channel_id(&self, channel_id: &ChannelId) -> Result<Vec<Payment>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payments_for_channel(self.namespace.as_str(), channel_id, &mut conn).await
    }

    async fn delete_by_channel_id(&self, channel_id: &ChannelId) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await?;
        let count = payments::delete_payments_for_channel(self.namespace.as_str(), channel_id, &mut conn).await?;
        debug!("🗃️ Deleted {count} payments for channel {channel_id}");
        Ok(())
    }
}

pub struct SqlChannels {
    pool: AnyPool,
    namespace: Namespace,
    contract: Arc<dyn ChannelContract>,
}

impl SqlChannels {
    pub fn new(pool: AnyPool, namespace: Namespace, contract: Arc<dyn ChannelContract>) -> Self {
        Self { pool, namespace, contract }
    }
}

#[async_trait]
impl ChannelsDatabase for SqlChannels {
    fn contract(&self) -> &dyn ChannelContract {
        self.contract.as_ref()
    }

    async fn save(&self, channel: &PaymentChannel) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await?;
        channels::insert_channel(self.namespace.as_str(), channel, &mut conn).await?;
        debug!("🗃️ Channel {} saved", channel.channel_id);
        Ok(())
    }

    async fn save_or_update(&self, channel: &PaymentChannel) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await?;
        channels::upsert_channel(self.namespace.as_str(), channel, &mut conn).await
    }

    async fn first_by_id(&self, channel_id: &ChannelId) -> Result<Option<PaymentChannel>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        channels::fetch_channel(self.namespace.as_str(), channel_id, &mut conn).await
    }

    async fn spend(&self, channel_id: &ChannelId, spent: Amount) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await?;
        channels::update_spent(self.namespace.as_str(), channel_id, spent, &mut conn).await
    }

    async fn update_state(&self, channel_id: &ChannelId, state: ChannelState) -> Result<(), StorageError> {
        let mut conn = self.pool.acquire().await?;
        channels::update_state(self.namespace.as_str(), channel_id, state, &mut conn).await
    }

    async fn all(&self) -> Result<Vec<PaymentChannel>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        channels::fetch_all_channels(self.namespace.as_str(), &mut conn).await
    }

    async fn find_by_sender_receiver(&self, sender: &str, receiver: &str) -> Result<Vec<PaymentChannel>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        channels::fetch_channels_by_parties(self.namespace.as_str(), sender, receiver, &mut conn).await
    }

    /// Deletes the channel together with its payments and tokens, in one transaction.
    async fn delete_by_id(&self, channel_id: &ChannelId) -> Result<(), StorageError> {
        let ns = self.namespace.as_str();
        let mut tx = self.pool.begin().await?;
        tokens::delete_tokens_for_channel(ns, channel_id, &mut tx).await?;
        payments::delete_payments_for_channel(ns, channel_id, &mut tx).await?;
        let count = channels::delete_channel(ns, channel_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Deleted {count} channel(s) with id {channel_id}");
        Ok(())
    }
}
