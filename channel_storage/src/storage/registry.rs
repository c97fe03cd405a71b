use std::{collections::HashMap, fmt::Debug, sync::Arc};

use crate::{connection::Protocol, traits::BackendFactory};

/// Maps each protocol to the factory of the backend family that serves it.
#[derive(Clone)]
pub struct BackendRegistry {
    factories: HashMap<Protocol, Arc<dyn BackendFactory>>,
}

impl BackendRegistry {
    /// A registry without any backends.
    pub fn empty() -> Self {
        Self { factories: HashMap::new() }
    }

    /// Registers `factory` for `protocol`, returning the factory it replaces, if any.
    pub fn register(
        &mut self,
        protocol: Protocol,
        factory: Arc<dyn BackendFactory>,
    ) -> Option<Arc<dyn BackendFactory>> {
        self.factories.insert(protocol, factory)
    }

    pub fn with(mut self, protocol: Protocol, factory: Arc<dyn BackendFactory>) -> Self {
        self.register(protocol, factory);
        self
    }

    pub fn get(&self, protocol: Protocol) -> Option<Arc<dyn BackendFactory>> {
        self.factories.get(&protocol).cloned()
    }

    pub fn is_registered(&self, protocol: Protocol) -> bool {
        self.factories.contains_key(&protocol)
    }

    /// The protocols that have a registered backend, in a stable order.
    pub fn protocols(&self) -> Vec<Protocol> {
        let mut protocols = self.factories.keys().copied().collect::<Vec<_>>();
        protocols.sort();
        protocols
    }
}

/// The built-in backends: `nedb` always, `sqlite` and `postgresql` when their features are enabled. `mongo` has no
/// built-in backend.
impl Default for BackendRegistry {
    fn default() -> Self {
        let registry = Self::empty().with(Protocol::Nedb, Arc::new(crate::document::DocumentFactory));
        #[cfg(feature = "sqlite")]
        let registry = registry.with(Protocol::Sqlite, Arc::new(crate::relational::RelationalFactory));
        #[cfg(feature = "postgres")]
        let registry = registry.with(Protocol::Postgresql, Arc::new(crate::relational::RelationalFactory));
        registry
    }
}

impl Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.protocols().into_iter().map(|p| (p, self.factories[&p].family()));
        f.debug_map().entries(entries).finish()
    }
}
