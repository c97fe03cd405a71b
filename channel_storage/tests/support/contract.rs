use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use channel_storage::{
    db_types::{ChannelId, ChannelState},
    traits::ChannelContract,
    StorageError,
};

/// A channel contract with hard-coded channel states. Channels it knows nothing about are open.
#[derive(Default)]
pub struct FixedContract {
    states: Mutex<HashMap<ChannelId, ChannelState>>,
}

impl FixedContract {
    pub fn set(&self, channel_id: &ChannelId, state: ChannelState) {
        self.states.lock().unwrap().insert(channel_id.clone(), state);
    }
}

#[async_trait]
impl ChannelContract for FixedContract {
    async fn channel_state(&self, channel_id: &ChannelId) -> Result<ChannelState, StorageError> {
        Ok(self.states.lock().unwrap().get(channel_id).copied().unwrap_or_default())
    }
}
