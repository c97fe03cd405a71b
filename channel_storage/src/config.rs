use std::{env, path::PathBuf, str::FromStr, time::Duration};

use log::*;
use pcs_common::helpers::parse_boolean_flag;

use crate::{
    db_types::Namespace,
    migrations::{MigrationTimeouts, DEFAULT_MIGRATIONS_ROOT},
    storage::{MigratePolicy, SyncMode},
};

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Settings handed to a backend factory when it opens an engine.
#[derive(Clone, Debug)]
pub struct EngineSettings {
    /// The folder holding one migrations sub-folder per relational protocol, e.g. `<root>/sqlite`.
    pub migrations_root: PathBuf,
    pub max_connections: u32,
    pub timeouts: MigrationTimeouts,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            migrations_root: PathBuf::from(DEFAULT_MIGRATIONS_ROOT),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            timeouts: MigrationTimeouts::default(),
        }
    }
}

impl EngineSettings {
    pub fn with_migrations_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.migrations_root = root.into();
        self
    }
}

/// Settings that govern how a [`crate::StorageFactory`] assembles storage.
#[derive(Clone, Debug, Default)]
pub struct StorageSettings {
    /// Records of different tenants sharing a database are kept apart by namespace.
    pub namespace: Namespace,
    /// Whether a migration sync started during a build is awaited before the build returns.
    pub sync_mode: SyncMode,
    pub engine: EngineSettings,
}

#[derive(Clone, Debug, Default)]
pub struct StorageConfig {
    pub database_url: String,
    pub migrate_policy: Option<MigratePolicy>,
    pub settings: StorageSettings,
}

impl StorageConfig {
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let database_url = lookup("PCS_DATABASE_URL").unwrap_or_else(|| {
            warn!("🪛️ PCS_DATABASE_URL is not set. The connection URL must be supplied some other way.");
            String::default()
        });
        let namespace = lookup("PCS_NAMESPACE").map(|s| Namespace::new(s.trim())).unwrap_or_default();
        let migrate_policy = lookup("PCS_MIGRATE_POLICY").and_then(|s| {
            s.parse::<MigratePolicy>()
                .map_err(|e| warn!("🪛️ Ignoring PCS_MIGRATE_POLICY. {e}. Migrations will be synced silently."))
                .ok()
        });
        let sync_mode = if parse_boolean_flag(lookup("PCS_AWAIT_MIGRATIONS"), false) {
            SyncMode::Blocking
        } else {
            SyncMode::Background
        };
        let migrations_root =
            lookup("PCS_MIGRATIONS_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(DEFAULT_MIGRATIONS_ROOT));
        let max_connections = parse_or_default(&lookup, "PCS_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS);
        let defaults = MigrationTimeouts::default();
        let timeouts = MigrationTimeouts {
            init: seconds_or_default(&lookup, "PCS_MIGRATION_INIT_TIMEOUT", defaults.init),
            check: seconds_or_default(&lookup, "PCS_MIGRATION_CHECK_TIMEOUT", defaults.check),
            sync: seconds_or_default(&lookup, "PCS_MIGRATION_SYNC_TIMEOUT", defaults.sync),
        };
        let engine = EngineSettings { migrations_root, max_connections, timeouts };
        Self { database_url, migrate_policy, settings: StorageSettings { namespace, sync_mode, engine } }
    }
}

fn parse_or_default<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + std::fmt::Display + Copy,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|s| {
            s.trim().parse::<T>().unwrap_or_else(|e| {
                error!("🪛️ {s} is not a valid value for {key}. {e} Using the default, {default}, instead.");
                default
            })
        })
        .unwrap_or(default)
}

fn seconds_or_default<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str, default: Duration) -> Duration {
    Duration::from_secs(parse_or_default(lookup, key, default.as_secs()))
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> StorageConfig {
        let vars = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<HashMap<_, _>>();
        StorageConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config_from(&[]);
        assert!(config.database_url.is_empty());
        assert!(config.migrate_policy.is_none());
        assert_eq!(config.settings.namespace.as_str(), "shared");
        assert_eq!(config.settings.sync_mode, SyncMode::Background);
        assert_eq!(config.settings.engine.migrations_root, PathBuf::from("./migrations"));
        assert_eq!(config.settings.engine.max_connections, 5);
        assert_eq!(config.settings.engine.timeouts, MigrationTimeouts::default());
    }

    #[test]
    fn values_from_env() {
        let config = config_from(&[
            ("PCS_DATABASE_URL", "sqlite://channels.db"),
            ("PCS_NAMESPACE", "tenant-a"),
            ("PCS_MIGRATE_POLICY", "Raise"),
            ("PCS_AWAIT_MIGRATIONS", "true"),
            ("PCS_MIGRATIONS_DIR", "/opt/pcs/migrations"),
            ("PCS_MAX_CONNECTIONS", "12"),
            ("PCS_MIGRATION_SYNC_TIMEOUT", "60"),
        ]);
        assert_eq!(config.database_url, "sqlite://channels.db");
        assert_eq!(config.settings.namespace.as_str(), "tenant-a");
        assert_eq!(config.migrate_policy, Some(MigratePolicy::Raise));
        assert_eq!(config.settings.sync_mode, SyncMode::Blocking);
        assert_eq!(config.settings.engine.migrations_root, PathBuf::from("/opt/pcs/migrations"));
        assert_eq!(config.settings.engine.max_connections, 12);
        assert_eq!(config.settings.engine.timeouts.sync, Duration::from_secs(60));
        assert_eq!(config.settings.engine.timeouts.init, Duration::from_secs(10));
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = config_from(&[
            ("PCS_MIGRATE_POLICY", "sometimes"),
            ("PCS_MAX_CONNECTIONS", "many"),
            ("PCS_MIGRATION_CHECK_TIMEOUT", "-3"),
        ]);
        assert!(config.migrate_policy.is_none());
        assert_eq!(config.settings.engine.max_connections, 5);
        assert_eq!(config.settings.engine.timeouts.check, Duration::from_secs(30));
    }
}
