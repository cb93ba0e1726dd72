//! Diagnostics for the `mdm` binary.
//!
//! The console redraws the terminal, so diagnostics are appended to
//! `$XDG_STATE_HOME/mdm/mdm.log` (usually `~/.local/state/mdm/mdm.log`).
//! `MDM_LOG` selects the filter, then `RUST_LOG`, then [`DEFAULT_FILTER`].

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "info,mdm=debug,mdm_core=debug";
pub const LOG_FILE_NAME: &str = "mdm.log";

/// Filter directives from `MDM_LOG`, else `RUST_LOG`, else the default.
/// Blank variables count as unset.
fn filter_directives(mdm_log: Option<String>, rust_log: Option<String>) -> String {
    [mdm_log, rust_log]
        .into_iter()
        .flatten()
        .find(|d| !d.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

fn env_filter() -> EnvFilter {
    let directives = filter_directives(
        std::env::var("MDM_LOG").ok(),
        std::env::var("RUST_LOG").ok(),
    );
    EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Where [`init_logging`] writes; the directory is created if missing.
pub fn log_file_path() -> Result<PathBuf> {
    let dirs = xdg::BaseDirectories::with_prefix("mdm").context("locate XDG state directory")?;
    let dir = dirs.get_state_home();
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir.join(LOG_FILE_NAME))
}

/// Appends diagnostics to the state log file and returns its path. An error
/// leaves no subscriber installed so the caller can use [`init_logging_stderr`].
pub fn init_logging() -> Result<PathBuf> {
    let path = log_file_path()?;
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing init: {}", e))?;

    tracing::info!(pid = std::process::id(), "mdm session started");
    Ok(path)
}

/// Diagnostics to stderr, for when the state log cannot be opened.
pub fn init_logging_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}
