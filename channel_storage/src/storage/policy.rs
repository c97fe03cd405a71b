use std::{fmt::Display, str::FromStr};

/// What to do when a relational schema is behind the local migrations at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MigratePolicy {
    /// Sync the schema to the latest local migration.
    #[default]
    Silent,
    /// Refuse to build the storage.
    Raise,
}

impl FromStr for MigratePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "silent" => Ok(Self::Silent),
            "raise" => Ok(Self::Raise),
            _ => Err(format!("'{s}' is not a valid migrate policy. Use 'silent' or 'raise'")),
        }
    }
}

impl Display for MigratePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigratePolicy::Silent => f.write_str("silent"),
            MigratePolicy::Raise => f.write_str("raise"),
        }
    }
}

/// Whether a schema sync triggered by a build runs in the background or is awaited by the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    #[default]
    Background,
    Blocking,
}
