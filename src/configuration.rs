use std::path::PathBuf;

use clap::ValueEnum;

pub const DOCUMENT_FILE: &str = "file.json";
pub const SQLITE_FILE: &str = "hbnb.sqlite";

/// Which persistence backend serves this process. Chosen once at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StorageBackend {
    /// In-process registry flushed to a JSON document.
    File,
    /// SQLite database with foreign keys and a join table.
    Db,
}

#[derive(Clone, Debug)]
pub struct Configuration {
    pub backend: StorageBackend,
    pub data_dir: PathBuf,
    pub log_file: Option<PathBuf>,
    pub reset: bool,
}

impl Configuration {
    pub fn storage_path(&self) -> PathBuf {
        match self.backend {
            StorageBackend::File => self.data_dir.join(DOCUMENT_FILE),
            StorageBackend::Db => self.data_dir.join(SQLITE_FILE),
        }
    }
}
