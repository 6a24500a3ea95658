mod admin;
mod commands;

pub use admin::{run_admin, run_init};
pub use commands::AdminCommands;

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::registry::Registry;
use crate::security::AllowAllPolicy;
use crate::storage::ArchiveStorage;
use crate::store::SqliteStore;

fn data_config(data_dir: &str) -> ServerConfig {
    ServerConfig {
        data_dir: data_dir.into(),
        ..ServerConfig::default()
    }
}

/// Opens the registry over an initialized data directory. Administrative
/// commands bypass role checks.
pub fn open_registry(data_dir: &str) -> anyhow::Result<Registry> {
    let config = data_config(data_dir);
    let db_path = config.db_path();

    if !db_path.exists() {
        anyhow::bail!(
            "Database not found at {}. Run 'pkgvault admin init' first.",
            db_path.display()
        );
    }

    let store = SqliteStore::new(&db_path)?;
    let storage = ArchiveStorage::new(&config.files_dir());
    Ok(Registry::new(
        Arc::new(store),
        storage,
        Arc::new(AllowAllPolicy),
    ))
}
