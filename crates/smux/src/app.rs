//! Application entry: CLI, logging, target resolution, loop wiring

use crate::mux::Multiplexer;
use crate::signals;
use crate::terminal_guard::TerminalGuard;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use crossterm::terminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "smux - terminal session multiplexer")]
struct Args {
    /// Program to run in each session, resolved next to the smux binary
    /// and invoked with no arguments
    target: String,

    /// Path to log file (logging stays off without one; the terminal
    /// itself is never written to by the logger)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log level
    #[arg(long, value_enum, default_value = "warn")]
    log_level: LogLevel,
}

pub fn run() -> Result<()> {
    let args = Args::parse();

    if let Some(path) = &args.log_file {
        init_logging(path, &args.log_level)?;
    }

    let target = resolve_target(&args.target)?;
    info!("multiplexing {}", target.display());

    let (cols, rows) = terminal::size().context("failed to query terminal size")?;

    let mut guard = TerminalGuard::acquire()?;
    guard.enter().context("failed to set up terminal")?;

    signals::install().context("failed to install signal handlers")?;

    let mut mux = Multiplexer::new(target, cols, rows);
    if let Err(e) = mux.spawn_session() {
        let _ = guard.restore();
        return Err(e).context("failed to spawn initial session");
    }

    let outcome = mux.run();

    guard.restore().context("failed to restore terminal")?;

    let reason = outcome?;
    info!("exiting: {reason:?}");
    Ok(())
}

/// Resolve the target as a sibling of the running executable and insist
/// it is something we can exec.
fn resolve_target(name: &str) -> Result<PathBuf> {
    let exe = std::env::current_exe().context("failed to locate own executable")?;
    let dir = exe
        .parent()
        .context("executable has no parent directory")?;
    let path = dir.join(name);

    let meta = std::fs::metadata(&path)
        .with_context(|| format!("target {} not found", path.display()))?;

    use std::os::unix::fs::PermissionsExt;
    if !meta.is_file() || meta.permissions().mode() & 0o111 == 0 {
        anyhow::bail!("target {} is not an executable file", path.display());
    }

    Ok(path)
}

fn init_logging(path: &Path, level: &LogLevel) -> Result<()> {
    let log_level = match level {
        LogLevel::Trace => tracing::Level::TRACE,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Error => tracing::Level::ERROR,
    };

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file: {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(Arc::new(log_file))
        .with_ansi(false)
        .init();

    Ok(())
}
