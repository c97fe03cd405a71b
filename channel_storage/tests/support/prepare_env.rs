use std::path::{Path, PathBuf};

use log::*;

pub fn prepare_test_env() {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
}

/// A connection string for a fresh SQLite file inside `dir`.
pub fn random_db_url(dir: &Path) -> String {
    format!("sqlite://{}/test_store_{}.db", dir.display(), rand::random::<u64>())
}

/// The migrations shipped with the crate.
pub fn migrations_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations")
}
