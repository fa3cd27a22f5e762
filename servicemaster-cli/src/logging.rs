//! File logging for the TUI process
//!
//! The terminal belongs to the dashboard, so every event goes to a log file
//! under the XDG state directory.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "servicemaster.log";

/// Keeps the non-blocking writer alive for the life of the process
static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Directory that holds the log file
pub fn log_dir() -> PathBuf {
    state_home(
        std::env::var_os("XDG_STATE_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
    .join("servicemaster")
}

fn state_home(xdg_state: Option<PathBuf>, home: Option<PathBuf>) -> PathBuf {
    match (xdg_state, home) {
        (Some(dir), _) if dir.is_absolute() => dir,
        (_, Some(home)) if !home.as_os_str().is_empty() => home.join(".local").join("state"),
        _ => std::env::temp_dir(),
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Returns the log file path when file
/// logging is active.
pub fn init() -> Option<PathBuf> {
    let dir = log_dir();
    let path = dir.join(LOG_FILE);
    match open_writer(&dir, &path) {
        Ok(file) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let _ = LOG_GUARD.set(guard);
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_target(false)
                .with_ansi(false)
                .with_writer(non_blocking)
                .init();
            tracing::info!(path = %path.display(), "logging initialized");
            Some(path)
        }
        Err(err) => {
            // No file: drop events rather than paint over the dashboard
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(std::io::sink)
                .init();
            tracing::warn!(error = %err, path = %path.display(), "log file unavailable");
            None
        }
    }
}

fn open_writer(dir: &Path, path: &Path) -> std::io::Result<std::fs::File> {
    std::fs::create_dir_all(dir)?;
    OpenOptions::new().create(true).append(true).open(path)
}
