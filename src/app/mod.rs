mod wiring;

use std::io::Write;

use anyhow::{Context as AnyhowContext, Result};
use serde_json::Value;

use crate::commands::CommandRunner;
use crate::storage::{Storage, StorageScope};
use crate::{cli, context};

fn log_startup_info(ctx: &context::Context) {
    log::info!("🚀 Starting hbnb");
    log::info!("🗄️ Storage: {:?}", ctx.config.backend);
    log::info!("📂 Data dir: {}", ctx.config.data_dir.to_string_lossy());
    if let Some(path) = ctx.config.log_file.as_deref() {
        log::info!("📝 Log file: {}", path.to_string_lossy());
    }
}

/// Runs one command as a single unit of work: mutations are persisted only
/// when the command succeeds, and the backend is shut down either way. The
/// command's own error wins over a shutdown error.
pub fn execute(storage: &dyn Storage, cmd: &cli::Command) -> Result<Value> {
    let result = cmd.run(storage);
    if result.is_ok() {
        storage.persist().context("persisting changes")?;
    }
    result
}

pub fn run() -> Result<()> {
    let cli = cli::parse();
    let ctx = context::Context::from_cli(&cli);

    crate::tracing::init(ctx.config.log_file.as_deref());
    log_startup_info(&ctx);

    wiring::init_data_dir(&ctx.config).context("initializing data dir")?;
    let scope = StorageScope::new(wiring::init_storage(&ctx.config)?);

    let span = tracing::info_span!("command", name = cli.cmd.name());
    let outcome = span.in_scope(|| execute(&*scope, &cli.cmd));
    let closed = scope.close().context("shutting down storage");

    let value = outcome?;
    closed?;

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, &value)?;
    writeln!(stdout)?;
    Ok(())
}
