use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;

mod commands;

use channel_storage::{MigratePolicy, StorageConfig};

#[derive(Parser, Debug)]
#[command(version, about = "Inspect and migrate payment-channel storage")]
pub struct Arguments {
    /// The connection string. Overrides PCS_DATABASE_URL.
    #[arg(short = 'u', long = "url", global = true)]
    url: Option<String>,
    /// The folder holding the per-protocol migration folders. Overrides PCS_MIGRATIONS_DIR.
    #[arg(short = 'm', long = "migrations", global = true)]
    migrations: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[clap(name = "config", about = "Print the migration configuration derived from the connection string")]
    Config,
    #[clap(name = "list", about = "List the migration units in the migrations folder")]
    List,
    #[clap(name = "check", about = "Report whether every local migration has been applied")]
    Check,
    #[clap(name = "sync", about = "Migrate the schema up or down to a target migration")]
    Sync(SyncParams),
    #[clap(name = "build", about = "Build the storage for the connection string and report on it")]
    Build(BuildParams),
}

#[derive(Debug, Args)]
pub struct SyncParams {
    /// The migration to sync to, by name or 14-digit prefix. Defaults to the newest local migration.
    #[arg(short = 't', long = "target")]
    target: Option<String>,
}

#[derive(Debug, Args)]
pub struct BuildParams {
    /// What to do if the schema is stale (silent, raise). Overrides PCS_MIGRATE_POLICY.
    #[arg(short = 'p', long = "policy")]
    policy: Option<MigratePolicy>,
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    let cli = Arguments::parse();
    let mut config = StorageConfig::from_env_or_default();
    if let Some(url) = cli.url {
        config.database_url = url;
    }
    if let Some(root) = cli.migrations {
        config.settings.engine.migrations_root = root.into();
    }
    if config.database_url.is_empty() {
        eprintln!("No connection string. Set PCS_DATABASE_URL or pass --url.");
        std::process::exit(1);
    }
    let result = match cli.command {
        Command::Config => commands::print_config(&config),
        Command::List => commands::print_migrations(&config).await,
        Command::Check => commands::check(&config).await,
        Command::Sync(params) => commands::sync(&config, params.target.as_deref()).await,
        Command::Build(params) => commands::build(config, params.policy).await,
    };
    if let Err(e) = result {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}
