//! Logging init: progress on stdout plus a full log under the XDG state dir.

use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const STDOUT_FILTER: &str = "info";
const FILE_FILTER: &str = "info,wtdl_core=debug";

/// `RUST_LOG` if set and valid, otherwise `default`.
fn env_filter_or(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

fn stdout_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .without_time()
        .with_filter(env_filter_or(STDOUT_FILTER))
}

/// Path of the log file, `~/.local/state/wtdl/wtdl.log`.
pub fn log_file_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("wtdl")?;
    Ok(xdg_dirs.get_state_home().join("wtdl").join("wtdl.log"))
}

/// Initialize logging to stdout and to the log file.
/// On failure (e.g. state dir unwritable), returns Err so the caller can fall back to stdout.
pub fn init_logging() -> Result<()> {
    let log_file_path = log_file_path()?;
    if let Some(dir) = log_file_path.parent() {
        fs::create_dir_all(dir)?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)?;

    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_filter(env_filter_or(FILE_FILTER));

    tracing_subscriber::registry()
        .with(stdout_layer())
        .with(file_layer)
        .try_init()?;

    tracing::debug!("wtdl logging initialized at {}", log_file_path.display());
    Ok(())
}

/// Initialize logging to stdout only. Use when [`init_logging`] fails so the CLI still reports progress.
pub fn init_logging_stdout() {
    let _ = tracing_subscriber::registry().with(stdout_layer()).try_init();
}
