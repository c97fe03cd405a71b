//! Records persisted by the storage layer.
//!
//! These types are backend-agnostic. Relational backends map them onto table rows, document backends store their
//! serde representation.
use std::fmt::Display;

use chrono::Utc;
pub use pcs_common::Amount;
use serde::{Deserialize, Serialize};

use crate::StorageError;

pub const DEFAULT_NAMESPACE: &str = "shared";

//--------------------------------------     Namespace      ---------------------------------------------------------
/// Logical partition for all records of a [`crate::Storage`] instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self(DEFAULT_NAMESPACE.to_string())
    }
}

impl Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Namespace {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

//--------------------------------------     ChannelId      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

//--------------------------------------    ChannelState     ---------------------------------------------------------
/// Lifecycle state of a channel, as reported by the channel contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChannelState {
    #[default]
    Open,
    Settling,
    Settled,
}

impl ChannelState {
    pub fn code(&self) -> i64 {
        match self {
            ChannelState::Open => 0,
            ChannelState::Settling => 1,
            ChannelState::Settled => 2,
        }
    }
}

impl TryFrom<i64> for ChannelState {
    type Error = StorageError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ChannelState::Open),
            1 => Ok(ChannelState::Settling),
            2 => Ok(ChannelState::Settled),
            v => Err(StorageError::InvalidRecord(format!("{v} is not a valid channel state"))),
        }
    }
}

impl Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelState::Open => f.write_str("Open"),
            ChannelState::Settling => f.write_str("Settling"),
            ChannelState::Settled => f.write_str("Settled"),
        }
    }
}

//--------------------------------------   PaymentChannel    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentChannel {
    pub channel_id: ChannelId,
    pub sender: String,
    pub receiver: String,
    /// The total value deposited into the channel
    pub value: Amount,
    /// The amount spent so far
    pub spent: Amount,
    pub state: ChannelState,
    /// Settlement period in blocks
    pub settlement_period: i64,
    pub token_contract: Option<String>,
}

impl PaymentChannel {
    pub fn new(channel_id: ChannelId, sender: &str, receiver: &str, value: Amount) -> Self {
        Self {
            channel_id,
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            value,
            spent: Amount::default(),
            state: ChannelState::Open,
            settlement_period: 0,
            token_contract: None,
        }
    }

    pub fn remaining(&self) -> Amount {
        self.value - self.spent
    }
}

//--------------------------------------       Payment       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub channel_id: ChannelId,
    pub sender: String,
    pub receiver: String,
    /// The price of this particular payment
    pub price: Amount,
    /// The cumulative value of the channel spent, including this payment
    pub value: Amount,
    pub channel_value: Amount,
    pub signature: String,
    pub meta: String,
    pub token_contract: Option<String>,
    /// The token this payment was redeemed for, if any
    pub token: Option<String>,
    /// Unix timestamp (seconds)
    pub created_at: i64,
}

impl Payment {
    pub fn new(channel: &PaymentChannel, price: Amount, value: Amount, signature: &str) -> Self {
        Self {
            channel_id: channel.channel_id.clone(),
            sender: channel.sender.clone(),
            receiver: channel.receiver.clone(),
            price,
            value,
            channel_value: channel.value,
            signature: signature.to_string(),
            meta: String::default(),
            token_contract: channel.token_contract.clone(),
            token: None,
            created_at: Utc::now().timestamp(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn channel_state_codes() {
        for state in [ChannelState::Open, ChannelState::Settling, ChannelState::Settled] {
            assert_eq!(ChannelState::try_from(state.code()).unwrap(), state);
        }
        assert!(ChannelState::try_from(7).is_err());
    }

    #[test]
    fn default_namespace() {
        assert_eq!(Namespace::default().as_str(), "shared");
    }

    #[test]
    fn remaining_channel_value() {
        let mut channel = PaymentChannel::new("0xabc".into(), "alice", "bob", Amount::from(100));
        channel.spent = Amount::from(30);
        assert_eq!(channel.remaining(), Amount::from(70));
        let payment = Payment::new(&channel, Amount::from(10), Amount::from(40), "0xsig");
        assert_eq!(payment.channel_value, Amount::from(100));
        assert_eq!(payment.receiver, "bob");
    }
}
