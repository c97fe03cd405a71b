use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use channel_storage::{
    db_types::{ChannelId, ChannelState},
    migrations::{ConnectionParams, MigrationConfig, Migrator, SqlxToolLoader},
    traits::ChannelContract,
    ConnectionDescriptor,
    MigratePolicy,
    StorageConfig,
    StorageError,
    StorageFactory,
};
use log::*;
use prettytable::{row, Table};

/// The command-line tools have no access to the chain, so every channel is taken to be open.
struct AssumeOpen;

#[async_trait]
impl ChannelContract for AssumeOpen {
    async fn channel_state(&self, _channel_id: &ChannelId) -> Result<ChannelState, StorageError> {
        Ok(ChannelState::Open)
    }
}

fn migration_config(config: &StorageConfig) -> Result<MigrationConfig> {
    if config.database_url.is_empty() {
        return Err(anyhow!("No connection string. Set PCS_DATABASE_URL or pass --url."));
    }
    let descriptor = ConnectionDescriptor::parse(&config.database_url)?;
    Ok(MigrationConfig::from_descriptor(&descriptor, &config.settings.engine.migrations_root))
}

fn migrator(config: &StorageConfig) -> Result<Migrator> {
    let migration_config = migration_config(config)?;
    if migration_config.is_noop() {
        return Err(anyhow!("The database at {} has no schema migrations", config.database_url));
    }
    Ok(Migrator::new(migration_config, Arc::new(SqlxToolLoader), config.settings.engine.timeouts))
}

pub fn print_config(config: &StorageConfig) -> Result<()> {
    let migration_config = migration_config(config)?;
    println!("----------------------------- Migration config -----------------------------");
    match migration_config.protocol() {
        Some(protocol) => println!("Protocol      : {protocol}"),
        None => println!("Protocol      : none (no migrations)"),
    }
    println!("Driver        : {}", migration_config.driver().unwrap_or("none"));
    match migration_config.connection() {
        ConnectionParams::None => println!("Connection    : none"),
        ConnectionParams::File { filename } => println!("File          : {filename}"),
        ConnectionParams::Server { user, password, host, port, database } => {
            println!("User          : {user}");
            println!("Password      : {password}");
            println!("Host          : {host}");
            println!("Port          : {}", port.map(|p| p.to_string()).unwrap_or_else(|| "default".into()));
            println!("Database      : {database}");
        },
    }
    match migration_config.migrations_dir() {
        Some(dir) => println!("Migrations    : {}", dir.display()),
        None => println!("Migrations    : none"),
    }
    println!("Namespace     : {}", config.settings.namespace);
    println!("----------------------------------------------------------------------------");
    Ok(())
}

pub async fn print_migrations(config: &StorageConfig) -> Result<()> {
    let migrator = migrator(config)?;
    let names = migrator.retrieve_in_folder_migration_list().await?;
    if names.is_empty() {
        let dir = migrator.migrations_dir().map(|d| d.display().to_string()).unwrap_or_default();
        println!("There are no migrations in {dir}");
        return Ok(());
    }
    let mut table = Table::new();
    table.set_titles(row!["#", "Migration"]);
    for (i, name) in names.iter().enumerate() {
        table.add_row(row![i + 1, name]);
    }
    table.printstd();
    Ok(())
}

pub async fn check(config: &StorageConfig) -> Result<()> {
    let migrator = migrator(config)?;
    if !migrator.is_available().await {
        return Err(anyhow!("The migration tool could not be loaded. Check the log for details."));
    }
    if migrator.is_latest().await? {
        println!("✅️ The schema is up to date");
    } else {
        println!("⚠️ There are migrations that have not been applied");
    }
    Ok(())
}

pub async fn sync(config: &StorageConfig, target: Option<&str>) -> Result<()> {
    let migrator = migrator(config)?;
    if !migrator.is_available().await {
        return Err(anyhow!("The migration tool could not be loaded. Check the log for details."));
    }
    migrator.sync(target).await?;
    println!("✅️ Schema synced to {}", target.unwrap_or("the latest migration"));
    Ok(())
}

pub async fn build(config: StorageConfig, policy: Option<MigratePolicy>) -> Result<()> {
    if config.database_url.is_empty() {
        return Err(anyhow!("No connection string. Set PCS_DATABASE_URL or pass --url."));
    }
    let policy = policy.or(config.migrate_policy);
    let factory = StorageFactory::with_settings(config.settings.clone());
    info!("🗃️ Building storage with policy {}", policy.map(|p| p.to_string()).unwrap_or_else(|| "(none)".into()));
    let mut storage = factory.build(&config.database_url, Arc::new(AssumeOpen), policy).await?;
    println!("Protocol      : {}", storage.engine().protocol());
    println!("Namespace     : {}", storage.namespace());
    println!("Migratable    : {}", storage.engine().migrator().is_some());
    match storage.take_pending_sync() {
        Some(sync) => {
            println!("Schema sync   : running");
            sync.wait().await?;
            println!("Schema sync   : complete");
        },
        None => println!("Schema sync   : not needed"),
    }
    println!("Channels      : {}", storage.channels().all().await?.len());
    storage.close().await?;
    Ok(())
}
