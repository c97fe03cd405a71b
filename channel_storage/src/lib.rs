//! Channel Storage
//!
//! A pluggable persistence layer for payment-channel clients. It exposes a single storage facade, [`Storage`], over
//! three datasets (redeemed tokens, payments and channels) that can be backed by any of several engines:
//!
//! * `nedb`: embedded document storage, in memory or in a directory of collection files.
//! * `sqlite`: embedded relational storage (feature `sqlite`, on by default).
//! * `postgresql`: client-server relational storage (feature `postgres`).
//! * `mongo`: recognised, but there is no built-in backend. Register one in a [`BackendRegistry`] to use it.
//!
//! The [`StorageFactory`] selects the backend family for a connection string and builds the storage. Relational
//! engines carry a [`migrations::Migrator`], and the factory refuses, or repairs, a stale schema according to the
//! [`MigratePolicy`] before any dataset accessor is handed out.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use channel_storage::{traits::ChannelContract, StorageError, StorageFactory, StorageSettings};
//! # async fn example(contract: Arc<dyn ChannelContract>) -> Result<(), StorageError> {
//! let factory = StorageFactory::with_settings(StorageSettings::default());
//! let storage = factory.build("sqlite://./data/channels.db", contract, None).await?;
//! let open_channels = storage.channels().all_open().await?;
//! # Ok(())
//! # }
//! ```
mod config;
mod connection;
mod errors;
mod storage;

pub mod db_types;
pub mod document;
pub mod migrations;
pub mod relational;
pub mod traits;

pub use config::{EngineSettings, StorageConfig, StorageSettings};
pub use connection::{ConnectionDescriptor, Protocol};
pub use errors::StorageError;
pub use storage::{BackendRegistry, MigratePolicy, Storage, StorageFactory, SyncHandle, SyncMode};
