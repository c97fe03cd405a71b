//! Capability interfaces implemented by storage backends.
//!
//! A backend family consists of an [`Engine`] and one implementation each of [`TokensDatabase`],
//! [`PaymentsDatabase`] and [`ChannelsDatabase`]. A [`BackendFactory`] opens the engine for a connection string and
//! builds the accessors over it. Backends are registered by protocol in a [`crate::BackendRegistry`].
mod backend;
mod contract;
mod datasets;
mod engine;

pub use backend::{Backend, BackendFactory};
pub use contract::ChannelContract;
pub use datasets::{refresh_channel_states, ChannelsDatabase, DatasetAccessors, PaymentsDatabase, TokensDatabase};
pub use engine::Engine;
