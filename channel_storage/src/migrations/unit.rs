//! Migration units and the schema handle they operate on.
//!
//! A migration unit is a named, reversible schema change. Names start with a 14-digit `YYYYMMDDhhmmss` prefix, so
//! sorting names lexically sorts them chronologically. On disk a unit is a pair of SQL scripts:
//!
//! ```text
//! <root>/<protocol>/20190128210101_add-settlement-period-to-channel.up.sql
//! <root>/<protocol>/20190128210101_add-settlement-period-to-channel.down.sql
//! ```
use std::{collections::BTreeMap, sync::OnceLock};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use log::*;
use regex::Regex;
use sqlx::migrate::{AppliedMigration, Migrate, MigrateError, Migration};

use crate::StorageError;

/// Width of the chronological prefix carried by every migration name
pub const MIGRATION_PREFIX_LEN: usize = 14;

fn prefix_regex() -> &'static Regex {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    PREFIX.get_or_init(|| Regex::new(r"^(\d{14})").expect("static regex"))
}

/// The first [`MIGRATION_PREFIX_LEN`] characters of `name`, or the whole name if it is shorter.
pub fn migration_prefix(name: &str) -> &str {
    match name.char_indices().nth(MIGRATION_PREFIX_LEN) {
        Some((idx, _)) => &name[..idx],
        None => name,
    }
}

/// Extracts the numeric version from a migration name, checking that the prefix is a valid timestamp.
pub fn parse_version(name: &str) -> Result<i64, StorageError> {
    let prefix = prefix_regex()
        .captures(name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| StorageError::InvalidMigrationName(format!("{name} does not start with a 14-digit timestamp")))?;
    NaiveDateTime::parse_from_str(prefix, "%Y%m%d%H%M%S")
        .map_err(|e| StorageError::InvalidMigrationName(format!("{name}: {e}")))?;
    prefix.parse::<i64>().map_err(|e| StorageError::InvalidMigrationName(format!("{name}: {e}")))
}

/// The schema-mutation handle migration units run against.
#[async_trait]
pub trait SchemaHandle: Send {
    /// Makes sure migration bookkeeping exists and that no earlier migration was left half-applied.
    async fn prepare(&mut self) -> Result<(), StorageError>;
    async fn applied(&mut self) -> Result<Vec<AppliedMigration>, StorageError>;
    async fn lock(&mut self) -> Result<(), StorageError>;
    async fn unlock(&mut self) -> Result<(), StorageError>;
    async fn apply_up(&mut self, migration: &Migration) -> Result<(), StorageError>;
    async fn apply_down(&mut self, migration: &Migration) -> Result<(), StorageError>;
}

/// [`SchemaHandle`] over any sqlx connection that supports migrations.
pub struct SqlxSchema<'c, C: ?Sized> {
    conn: &'c mut C,
}

impl<'c, C: ?Sized> SqlxSchema<'c, C> {
    pub fn new(conn: &'c mut C) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl<'c, C> SchemaHandle for SqlxSchema<'c, C>
where C: Migrate + Send + ?Sized
{
    async fn prepare(&mut self) -> Result<(), StorageError> {
        self.conn.ensure_migrations_table().await?;
        if let Some(version) = self.conn.dirty_version().await? {
            return Err(MigrateError::Dirty(version).into());
        }
        Ok(())
    }

    async fn applied(&mut self) -> Result<Vec<AppliedMigration>, StorageError> {
        Ok(self.conn.list_applied_migrations().await?)
    }

    async fn lock(&mut self) -> Result<(), StorageError> {
        Ok(self.conn.lock().await?)
    }

    async fn unlock(&mut self) -> Result<(), StorageError> {
        Ok(self.conn.unlock().await?)
    }

    async fn apply_up(&mut self, migration: &Migration) -> Result<(), StorageError> {
        let elapsed = self.conn.apply(migration).await?;
        debug!("🧬️ Applied migration {} ({}) in {elapsed:?}", migration.version, migration.description);
        Ok(())
    }

    async fn apply_down(&mut self, migration: &Migration) -> Result<(), StorageError> {
        let elapsed = self.conn.revert(migration).await?;
        debug!("🧬️ Reverted migration {} ({}) in {elapsed:?}", migration.version, migration.description);
        Ok(())
    }
}

/// A named, ordered schema change with forward and reverse scripts.
#[derive(Debug, Clone)]
pub struct MigrationUnit {
    name: String,
    up: Migration,
    down: Option<Migration>,
}

impl MigrationUnit {
    pub fn new(up: Migration, down: Option<Migration>) -> Self {
        let name = format!("{}_{}", up.version, up.description.replace(' ', "_"));
        Self { name, up, down }
    }

    /// Pairs the up and down scripts of a migration source into units, ordered by version.
    pub fn from_migrations<'a, I>(migrations: I) -> Vec<MigrationUnit>
    where I: IntoIterator<Item = &'a Migration> {
        let mut ups = BTreeMap::new();
        let mut downs = BTreeMap::new();
        for m in migrations {
            if m.migration_type.is_down_migration() {
                downs.insert(m.version, m.clone());
            } else {
                ups.insert(m.version, m.clone());
            }
        }
        for version in downs.keys().filter(|v| !ups.contains_key(v)) {
            warn!("🧬️ Migration {version} has a down script but no up script. It will be ignored.");
        }
        ups.into_values()
            .map(|up| {
                let down = downs.remove(&up.version);
                MigrationUnit::new(up, down)
            })
            .collect()
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn version(&self) -> i64 {
        self.up.version
    }

    pub fn checksum(&self) -> &[u8] {
        &self.up.checksum
    }

    pub fn is_reversible(&self) -> bool {
        self.down.is_some()
    }

    pub async fn up<H: SchemaHandle + ?Sized>(&self, schema: &mut H) -> Result<(), StorageError> {
        schema.apply_up(&self.up).await
    }

    pub async fn down<H: SchemaHandle + ?Sized>(&self, schema: &mut H) -> Result<(), StorageError> {
        match &self.down {
            Some(down) => schema.apply_down(down).await,
            None => Err(StorageError::IrreversibleMigration(self.name.clone())),
        }
    }
}

#[cfg(test)]
mod test {
    use std::borrow::Cow;

    use sqlx::migrate::MigrationType;

    use super::*;

    fn migration(version: i64, kind: MigrationType) -> Migration {
        Migration::new(version, Cow::Borrowed("add column"), kind, Cow::Borrowed("SELECT 1;"))
    }

    #[test]
    fn prefixes() {
        assert_eq!(migration_prefix("20190128210101-add-x"), "20190128210101");
        assert_eq!(migration_prefix("2019"), "2019");
        assert_eq!(parse_version("20190128210101-add-x").unwrap(), 20190128210101);
        assert_eq!(parse_version("20190128210101").unwrap(), 20190128210101);
        assert!(matches!(parse_version("add-x"), Err(StorageError::InvalidMigrationName(_))));
        // month 13 is not a timestamp
        assert!(matches!(parse_version("20191328210101_x"), Err(StorageError::InvalidMigrationName(_))));
    }

    #[test]
    fn pairs_up_and_down_scripts() {
        let migrations = vec![
            migration(20190128210101, MigrationType::ReversibleDown),
            migration(20180101000000, MigrationType::ReversibleUp),
            migration(20190128210101, MigrationType::ReversibleUp),
            migration(20180101000000, MigrationType::ReversibleDown),
            migration(20200101000000, MigrationType::Simple),
        ];
        let units = MigrationUnit::from_migrations(&migrations);
        let versions = units.iter().map(MigrationUnit::version).collect::<Vec<_>>();
        assert_eq!(versions, vec![20180101000000, 20190128210101, 20200101000000]);
        assert!(units[0].is_reversible());
        assert!(units[1].is_reversible());
        assert!(!units[2].is_reversible());
        assert_eq!(units[1].name(), "20190128210101_add_column");
    }
}
