mod support;

use std::{path::Path, sync::Arc};

use channel_storage::{
    traits::ChannelContract,
    BackendRegistry,
    MigratePolicy,
    Protocol,
    StorageError,
    StorageFactory,
    StorageSettings,
    SyncMode,
};
use support::{
    contract::FixedContract,
    prepare_env::prepare_test_env,
    spies::{scripted_migrator, ScriptedTool, Spy, SpyFactory},
};

fn contract() -> Arc<dyn ChannelContract> {
    Arc::new(FixedContract::default())
}

/// A migrations folder whose newest unit is `20190128210101`.
fn migrations_folder() -> tempfile::TempDir {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("sqlite");
    std::fs::create_dir_all(&dir).unwrap();
    for name in [
        "20180101000000_create-tables.up.sql",
        "20180101000000_create-tables.down.sql",
        "20190128210101_add-settlement-period-to-channel.up.sql",
        "20190128210101_add-settlement-period-to-channel.down.sql",
    ] {
        std::fs::write(dir.join(name), "-- noop").unwrap();
    }
    root
}

fn migratable_factory(tool: Arc<ScriptedTool>, root: &Path, mode: SyncMode) -> (StorageFactory, Arc<Spy>) {
    let spy_factory = SpyFactory::migratable(scripted_migrator(tool, root));
    let spy = spy_factory.spy();
    let settings = StorageSettings { sync_mode: mode, ..Default::default() };
    let registry = BackendRegistry::empty().with(Protocol::Sqlite, Arc::new(spy_factory));
    (StorageFactory::new(registry, settings), spy)
}

#[tokio::test]
async fn each_protocol_builds_only_its_own_family() {
    prepare_test_env();
    let factories = Protocol::ALL.map(|p| (p, SpyFactory::plain()));
    let spies = factories.iter().map(|(p, f)| (*p, f.spy())).collect::<Vec<_>>();
    let mut registry = BackendRegistry::empty();
    for (protocol, factory) in factories {
        registry.register(protocol, Arc::new(factory));
    }
    let storage_factory = StorageFactory::new(registry, StorageSettings::default());
    let urls = [
        (Protocol::Nedb, "nedb://"),
        (Protocol::Mongo, "mongo://localhost:27017/machinomy"),
        (Protocol::Sqlite, "sqlite://./data.db"),
        (Protocol::Postgresql, "postgresql://u:p@localhost/machinomy"),
    ];
    for (i, (protocol, url)) in urls.iter().enumerate() {
        let storage = storage_factory.build(url, contract(), None).await.unwrap();
        assert_eq!(storage.engine().protocol(), *protocol);
        for (p, spy) in &spies {
            let expected = if urls[..=i].iter().any(|(built, _)| built == p) { 1 } else { 0 };
            assert_eq!(spy.opened(), expected, "{p} after building {url}");
            assert_eq!(spy.datasets_built(), expected, "{p} after building {url}");
        }
    }
}

#[tokio::test]
async fn unknown_protocols_are_rejected() {
    let spy_factory = SpyFactory::plain();
    let spy = spy_factory.spy();
    let registry = BackendRegistry::empty().with(Protocol::Nedb, Arc::new(spy_factory));
    let storage_factory = StorageFactory::new(registry, StorageSettings::default());
    let err = storage_factory.build("foo://x", contract(), None).await.unwrap_err();
    assert!(matches!(err, StorageError::UnsupportedProtocol(p) if p == "foo"));
    let err = storage_factory.build("nedb", contract(), None).await.unwrap_err();
    assert!(matches!(err, StorageError::InvalidConnectionUrl(_)));
    assert_eq!(spy.opened(), 0);
}

#[tokio::test]
async fn recognised_protocols_need_a_registered_backend() {
    let storage_factory = StorageFactory::new(BackendRegistry::default(), StorageSettings::default());
    let err = storage_factory.build("mongo://localhost:27017/machinomy", contract(), None).await.unwrap_err();
    assert!(matches!(err, StorageError::BackendNotRegistered(Protocol::Mongo)));
}

#[tokio::test]
async fn raise_policy_rejects_a_stale_schema() {
    prepare_test_env();
    let root = migrations_folder();
    let tool = ScriptedTool::stale();
    let (storage_factory, spy) = migratable_factory(tool.clone(), root.path(), SyncMode::Background);
    let err = storage_factory.build("sqlite://./data.db", contract(), Some(MigratePolicy::Raise)).await.unwrap_err();
    assert!(matches!(err, StorageError::MigrationsPending));
    assert_eq!(err.to_string(), "There are non-applied db-migrations!");
    assert_eq!(spy.opened(), 1);
    assert_eq!(spy.datasets_built(), 0);
    assert_eq!(spy.closed(), 1);
    assert!(tool.sync_targets().is_empty());
}

#[tokio::test]
async fn raise_policy_accepts_a_current_schema() {
    let root = migrations_folder();
    let (storage_factory, spy) = migratable_factory(ScriptedTool::latest(), root.path(), SyncMode::Background);
    let storage = storage_factory.build("sqlite://./data.db", contract(), Some(MigratePolicy::Raise)).await.unwrap();
    assert!(!storage.has_pending_sync());
    assert_eq!(spy.datasets_built(), 1);
}

#[tokio::test]
async fn silent_policy_does_not_wait_for_the_sync() {
    prepare_test_env();
    let root = migrations_folder();
    for policy in [None, Some(MigratePolicy::Silent)] {
        let tool = ScriptedTool::stale();
        tool.block_syncs();
        let (storage_factory, spy) = migratable_factory(tool.clone(), root.path(), SyncMode::Background);
        let mut storage = storage_factory.build("sqlite://./data.db", contract(), policy).await.unwrap();
        assert_eq!(spy.datasets_built(), 1);
        assert!(tool.sync_targets().is_empty(), "the sync is still in flight");
        let sync = storage.take_pending_sync().expect("a background sync was started");
        assert!(!sync.is_finished());
        tool.release();
        sync.wait().await.unwrap();
        assert_eq!(tool.sync_targets(), vec!["20190128210101"]);
        assert!(storage.take_pending_sync().is_none());
    }
}

#[tokio::test]
async fn blocking_mode_awaits_the_sync() {
    let root = migrations_folder();
    let tool = ScriptedTool::stale();
    let (storage_factory, _) = migratable_factory(tool.clone(), root.path(), SyncMode::Blocking);
    let storage = storage_factory.build("sqlite://./data.db", contract(), None).await.unwrap();
    assert!(!storage.has_pending_sync());
    assert_eq!(tool.sync_targets(), vec!["20190128210101"]);
}

#[tokio::test]
async fn blocking_mode_reports_sync_failures() {
    let root = migrations_folder();
    let tool = ScriptedTool::stale();
    tool.fail_syncs();
    let (storage_factory, spy) = migratable_factory(tool, root.path(), SyncMode::Blocking);
    let err = storage_factory.build("sqlite://./data.db", contract(), None).await.unwrap_err();
    assert!(matches!(err, StorageError::MigrationToolUnavailable(_)));
    assert_eq!(spy.datasets_built(), 0);
    assert_eq!(spy.closed(), 1);
}

#[tokio::test]
async fn background_sync_failures_surface_through_the_handle() {
    let root = migrations_folder();
    let tool = ScriptedTool::stale();
    tool.fail_syncs();
    let (storage_factory, _) = migratable_factory(tool, root.path(), SyncMode::Background);
    let mut storage = storage_factory.build("sqlite://./data.db", contract(), None).await.unwrap();
    let err = storage.take_pending_sync().unwrap().wait().await.unwrap_err();
    assert!(matches!(err, StorageError::MigrationToolUnavailable(_)));
}

#[tokio::test]
async fn accessors_share_the_configured_namespace() {
    let settings = StorageSettings { namespace: "tenant-a".into(), ..Default::default() };
    let storage_factory = StorageFactory::new(BackendRegistry::default(), settings);
    let storage = storage_factory.build("nedb://", contract(), Some(MigratePolicy::Raise)).await.unwrap();
    assert_eq!(storage.namespace().as_str(), "tenant-a");
    assert!(storage.engine().migrator().is_none());
    storage.close().await.unwrap();
}
