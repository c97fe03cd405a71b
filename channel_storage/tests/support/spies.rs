//! Backend factories and migration tools that record how they are used.
use std::{
    path::Path,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
        Mutex,
    },
};

use async_trait::async_trait;
use channel_storage::{
    db_types::Namespace,
    document::DocumentEngine,
    migrations::{generate_config_object, MigrationConfig, MigrationTimeouts, MigrationTool, Migrator, ToolLoader},
    traits::{Backend, BackendFactory, ChannelContract, DatasetAccessors, Engine},
    ConnectionDescriptor,
    EngineSettings,
    Protocol,
    StorageError,
};
use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct Spy {
    opened: AtomicUsize,
    datasets_built: AtomicUsize,
    closed: AtomicUsize,
}

impl Spy {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn datasets_built(&self) -> usize {
        self.datasets_built.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A migration tool whose freshness and sync behaviour is scripted by the test.
#[derive(Default)]
pub struct ScriptedTool {
    latest: AtomicBool,
    fail: AtomicBool,
    blocked: AtomicBool,
    release: Notify,
    targets: Mutex<Vec<String>>,
}

impl ScriptedTool {
    pub fn stale() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn latest() -> Arc<Self> {
        let tool = Self::default();
        tool.latest.store(true, Ordering::SeqCst);
        Arc::new(tool)
    }

    /// Syncs wait until [`ScriptedTool::release`] is called.
    pub fn block_syncs(&self) {
        self.blocked.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    pub fn fail_syncs(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn sync_targets(&self) -> Vec<String> {
        self.targets.lock().unwrap().clone()
    }
}

#[async_trait]
impl MigrationTool for ScriptedTool {
    async fn check(&self) -> Result<bool, StorageError> {
        Ok(self.latest.load(Ordering::SeqCst))
    }

    async fn sync(&self, target: &str) -> Result<(), StorageError> {
        if self.blocked.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(StorageError::MigrationToolUnavailable("scripted failure".into()));
        }
        self.targets.lock().unwrap().push(target.to_string());
        self.latest.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct ScriptedLoader(Arc<ScriptedTool>);

#[async_trait]
impl ToolLoader for ScriptedLoader {
    async fn load(&self, _config: &MigrationConfig) -> Result<Arc<dyn MigrationTool>, StorageError> {
        Ok(self.0.clone() as Arc<dyn MigrationTool>)
    }
}

/// A migrator over `tool`, reading local migration names from `<root>/sqlite`.
pub fn scripted_migrator(tool: Arc<ScriptedTool>, root: &Path) -> Arc<Migrator> {
    let config = generate_config_object("sqlite://spy.db").unwrap().with_migrations_root(root);
    Arc::new(Migrator::new(config, Arc::new(ScriptedLoader(tool)), MigrationTimeouts::default()))
}

#[derive(Debug)]
pub struct SpyEngine {
    protocol: Protocol,
    migrator: Option<Arc<Migrator>>,
    spy: Arc<Spy>,
}

#[async_trait]
impl Engine for SpyEngine {
    fn protocol(&self) -> Protocol {
        self.protocol
    }

    fn migrator(&self) -> Option<Arc<Migrator>> {
        self.migrator.clone()
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.spy.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct SpyBackend {
    engine: Arc<SpyEngine>,
    spy: Arc<Spy>,
}

impl Backend for SpyBackend {
    fn engine(&self) -> Arc<dyn Engine> {
        self.engine.clone()
    }

    fn datasets(&self, namespace: &Namespace, contract: Arc<dyn ChannelContract>) -> DatasetAccessors {
        self.spy.datasets_built.fetch_add(1, Ordering::SeqCst);
        DocumentEngine::in_memory().datasets(namespace, contract)
    }
}

/// Opens spy engines and counts what the storage factory does with them.
pub struct SpyFactory {
    spy: Arc<Spy>,
    migrator: Option<Arc<Migrator>>,
}

impl SpyFactory {
    pub fn plain() -> Self {
        Self { spy: Arc::new(Spy::default()), migrator: None }
    }

    pub fn migratable(migrator: Arc<Migrator>) -> Self {
        Self { spy: Arc::new(Spy::default()), migrator: Some(migrator) }
    }

    pub fn spy(&self) -> Arc<Spy> {
        self.spy.clone()
    }
}

#[async_trait]
impl BackendFactory for SpyFactory {
    fn family(&self) -> &'static str {
        "spy"
    }

    async fn open(
        &self,
        descriptor: &ConnectionDescriptor,
        _settings: &EngineSettings,
    ) -> Result<Box<dyn Backend>, StorageError> {
        self.spy.opened.fetch_add(1, Ordering::SeqCst);
        let engine =
            SpyEngine { protocol: descriptor.protocol(), migrator: self.migrator.clone(), spy: self.spy.clone() };
        Ok(Box::new(SpyBackend { engine: Arc::new(engine), spy: self.spy.clone() }))
    }
}
