use clap::Parser;
use std::env;

use crate::cli::command::Command;
use crate::configuration::StorageBackend;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Manage and search property listings",
    long_about = "Create, inspect and search states, cities, places, amenities, users and reviews kept in a JSON document or a SQLite database.\n\nEnvironment:\n  HBNB_TYPE_STORAGE     Storage backend: file or db (default file)\n  HBNB_DATA_DIR         Directory holding persisted data\n  HBNB_LOG_FILE         Also write logs to this file\n"
)]
pub struct Cli {
    #[arg(
        long,
        env = "HBNB_TYPE_STORAGE",
        value_enum,
        default_value_t = StorageBackend::File,
        help = "Storage backend"
    )]
    pub storage: StorageBackend,

    #[arg(
        long,
        env = "HBNB_DATA_DIR",
        default_value = ".hbnb/",
        value_name = "DIR",
        help = "Directory to store persistent data"
    )]
    pub data_dir: String,

    #[arg(
        long = "log-file",
        env = "HBNB_LOG_FILE",
        value_name = "PATH",
        help = "Write logs to PATH (in addition to stderr)"
    )]
    pub log_file: Option<String>,

    #[arg(
        long,
        default_value_t = false,
        help = "Reset all persisted state (delete the document or database) before running"
    )]
    pub reset: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

pub fn parse() -> Cli {
    let dotenv_path = env::var("DOTENV_PATH").unwrap_or(".env".into());
    dotenvy::from_filename(&dotenv_path).ok();

    Cli::parse()
}
