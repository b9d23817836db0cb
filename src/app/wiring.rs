use std::sync::Arc;

use anyhow::{Context, Result};

use crate::configuration::{Configuration, StorageBackend};
use crate::storage::{self, FileStorage, SqliteStorage};

pub fn init_data_dir(cfg: &Configuration) -> Result<()> {
    std::fs::create_dir_all(&cfg.data_dir)
        .with_context(|| format!("creating data dir {}", cfg.data_dir.display()))?;
    Ok(())
}

/// Opens the configured backend. The choice is made here once per process;
/// nothing downstream knows which backend it talks to.
pub fn init_storage(cfg: &Configuration) -> Result<Arc<dyn storage::Storage>> {
    let path = cfg.storage_path();
    match cfg.backend {
        StorageBackend::File => {
            if cfg.reset {
                FileStorage::reset_all(&path).context("resetting storage")?;
            }
            let store = FileStorage::open(&path).context("loading document store")?;
            Ok(Arc::new(store))
        }
        StorageBackend::Db => {
            if cfg.reset {
                SqliteStorage::reset_all(&path).context("resetting storage")?;
            }
            let store = SqliteStorage::open(&path).context("initializing storage")?;
            Ok(Arc::new(store))
        }
    }
}
