use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Mutex;

use nordic_aurora::config::Config;

fn main() -> Result<()> {
    let cfg = Config::parse();
    init_logging(&cfg)?;
    nordic_aurora::app::run(cfg)
}

/// Logs go to `--log-file` only; the terminal is busy with frames.
fn init_logging(cfg: &Config) -> Result<()> {
    let Some(path) = &cfg.log_file else {
        return Ok(());
    };
    let level: tracing::Level = cfg
        .log_level
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid --log-level {:?}: {e}", cfg.log_level))?;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_max_level(level)
        .init();
    Ok(())
}
