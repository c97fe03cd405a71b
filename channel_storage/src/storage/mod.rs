//! Storage construction.
//!
//! A [`StorageFactory`] turns a connection string into a [`Storage`]: it selects the backend family registered for
//! the protocol in a [`BackendRegistry`], opens the engine, enforces the schema migration gate for engines that can
//! be migrated, and finally builds the dataset accessors over the finished engine.
mod aggregate;
mod factory;
mod policy;
mod registry;

pub use aggregate::{Storage, SyncHandle};
pub use factory::StorageFactory;
pub use policy::{MigratePolicy, SyncMode};
pub use registry::BackendRegistry;
