use std::sync::Arc;

use async_trait::async_trait;
use log::*;
use serde_json::{json, Value};

use super::{
    collection::{from_document, to_document, Document, Filter},
    DocumentEngine,
    CHANNELS,
    PAYMENTS,
    TOKENS,
};
use crate::{
    db_types::{Amount, ChannelId, ChannelState, Namespace, Payment, PaymentChannel},
    traits::{ChannelContract, ChannelsDatabase, PaymentsDatabase, TokensDatabase},
    StorageError,
};

const NAMESPACE: &str = "namespace";

fn scoped(namespace: &Namespace) -> Filter {
    Filter::new().eq(NAMESPACE, namespace.as_str())
}

fn with_namespace(mut doc: Document, namespace: &Namespace) -> Document {
    doc.insert(NAMESPACE.to_string(), Value::from(namespace.as_str()));
    doc
}

pub struct DocTokens {
    engine: DocumentEngine,
    namespace: Namespace,
}

impl DocTokens {
    pub fn new(engine: DocumentEngine, namespace: Namespace) -> Self {
        Self { engine, namespace }
    }
}

#[async_trait]
impl TokensDatabase for DocTokens {
    async fn save(&self, token: &str, channel_id: &ChannelId) -> Result<(), StorageError> {
        let doc = to_document(&json!({ "token": token, "channel_id": channel_id.as_str() }))?;
        let unique = scoped(&self.namespace).eq("token", token);
        self.engine.insert_unique(TOKENS, &unique, with_namespace(doc, &self.namespace)).await
    }

    async fn is_present(&self, token: &str) -> Result<bool, StorageError> {
        Ok(self.engine.count(TOKENS, &scoped(&self.namespace).eq("token", token)).await > 0)
    }

    async fn delete_by_channel_id(&self, channel_id: &ChannelId) -> Result<(), StorageError> {
        let filter = scoped(&self.namespace).eq("channel_id", channel_id.as_str());
        let count = self.engine.remove(TOKENS, &filter).await?;
        debug!("🗃️ Deleted {count} tokens for channel {channel_id}");
        Ok(())
    }
}

pub struct DocPayments {
    engine: DocumentEngine,
    namespace: Namespace,
}

impl DocPayments {
    pub fn new(engine: DocumentEngine, namespace: Namespace) -> Self {
        Self { engine, namespace }
    }

    async fn find(&self, filter: Filter) -> Result<Vec<Payment>, StorageError> {
        let mut payments = self
            .engine
            .find(PAYMENTS, &filter)
            .await
            .into_iter()
            .map(from_document)
            .collect::<Result<Vec<Payment>, _>>()?;
        payments.sort_by_key(|p| p.value);
        Ok(payments)
    }
}

#[async_trait]
impl PaymentsDatabase for DocPayments {
    async fn save(&self, token: &str, payment: &Payment) -> Result<(), StorageError> {
        let mut doc = to_document(payment)?;
        doc.insert("token".to_string(), Value::from(token));
        self.engine.insert(PAYMENTS, with_namespace(doc, &self.namespace)).await?;
        debug!("🗃️ Payment of {} in channel {} saved", payment.price, payment.channel_id);
        Ok(())
    }

    async fn first_maximum(&self, channel_id: &ChannelId) -> Result<Option<Payment>, StorageError> {
        let payments = self.find(scoped(&self.namespace).eq("channel_id", channel_id.as_str())).await?;
        Ok(payments.into_iter().last())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<Payment>, StorageError> {
        let payments = self.find(scoped(&self.namespace).eq("token", token)).await?;
        Ok(payments.into_iter().next())
    }

    async fn find_by_channel_id(&self, channel_id: &ChannelId) -> Result<Vec<Payment>, StorageError> {
        self.find(scoped(&self.namespace).eq("channel_id", channel_id.as_str())).await
    }

    async fn delete_by_channel_id(&self, channel_id: &ChannelId) -> Result<(), StorageError> {
        let filter = scoped(&self.namespace).eq("channel_id", channel_id.as_str());
        let count = self.engine.remove(PAYMENTS, &filter).await?;
        debug!("🗃️ Deleted {count} payments for channel {channel_id}");
        Ok(())
    }
}

pub struct DocChannels {
    engine: DocumentEngine,
    namespace: Namespace,
    contract: Arc<dyn ChannelContract>,
}

impl DocChannels {
    pub fn new(engine: DocumentEngine, namespace: Namespace, contract: Arc<dyn ChannelContract>) -> Self {
        Self { engine, namespace, contract }
    }

    fn by_id(&self, channel_id: &ChannelId) -> Filter {
        scoped(&self.namespace).eq("channel_id", channel_id.as_str())
    }

    async fn find(&self, filter: Filter) -> Result<Vec<PaymentChannel>, StorageError> {
        let mut channels = self
            .engine
            .find(CHANNELS, &filter)
            .await
            .into_iter()
            .map(from_document)
            .collect::<Result<Vec<PaymentChannel>, _>>()?;
        channels.sort_by(|a, b| a.channel_id.cmp(&b.channel_id));
        Ok(channels)
    }

    async fn set_field(&self, channel_id: &ChannelId, field: &str, value: Value) -> Result<(), StorageError> {
        let mut changes = Document::new();
        changes.insert(field.to_string(), value);
        match self.engine.update(CHANNELS, &self.by_id(channel_id), changes, false).await? {
            0 => Err(StorageError::RecordNotFound(format!("channel {channel_id}"))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl ChannelsDatabase for DocChannels {
    fn contract(&self) -> &dyn ChannelContract {
        self.contract.as_ref()
    }

    async fn save(&self, channel: &PaymentChannel) -> Result<(), StorageError> {
        let doc = with_namespace(to_document(channel)?, &self.namespace);
        self.engine.insert_unique(CHANNELS, &self.by_id(&channel.channel_id), doc).await?;
        debug!("🗃️ Channel {} saved", channel.channel_id);
        Ok(())
    }

    async fn save_or_update(&self, channel: &PaymentChannel) -> Result<(), StorageError> {
        let doc = with_namespace(to_document(channel)?, &self.namespace);
        self.engine.update(CHANNELS, &self.by_id(&channel.channel_id), doc, true).await?;
        Ok(())
    }

    async fn first_by_id(&self, channel_id: &ChannelId) -> Result<Option<PaymentChannel>, StorageError> {
        Ok(self.find(self.by_id(channel_id)).await?.into_iter().next())
    }

    async fn spend(&self, channel_id: &ChannelId, spent: Amount) -> Result<(), StorageError> {
        self.set_field(channel_id, "spent", serde_json::to_value(spent)?).await
    }

    async fn update_state(&self, channel_id: &ChannelId, state: ChannelState) -> Result<(), StorageError> {
        self.set_field(channel_id, "state", serde_json::to_value(state)?).await
    }

    async fn all(&self) -> Result<Vec<PaymentChannel>, StorageError> {
        self.find(scoped(&self.namespace)).await
    }

    async fn find_by_sender_receiver(&self, sender: &str, receiver: &str) -> Result<Vec<PaymentChannel>, StorageError> {
        self.find(scoped(&self.namespace).eq("sender", sender).eq("receiver", receiver)).await
    }

    /// Deletes the channel together with its payments and tokens.
    async fn delete_by_id(&self, channel_id: &ChannelId) -> Result<(), StorageError> {
        let filter = self.by_id(channel_id);
        self.engine.remove(TOKENS, &filter).await?;
        self.engine.remove(PAYMENTS, &filter).await?;
        let count = self.engine.remove(CHANNELS, &filter).await?;
        debug!("🗃️ Deleted {count} channel(s) with id {channel_id}");
        Ok(())
    }
}
