use std::path::PathBuf;

use crate::configuration::Configuration;

pub struct Context {
    pub config: Configuration,
}

impl Context {
    pub fn from_cli(cli: &crate::cli::Cli) -> Self {
        let cfg = Configuration {
            backend: cli.storage,
            data_dir: PathBuf::from(&cli.data_dir),
            log_file: cli.log_file.as_ref().map(PathBuf::from),
            reset: cli.reset,
        };
        Self { config: cfg }
    }
}
