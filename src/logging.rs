use std::fs;
use std::path::Path;

use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::Subscriber;
use tracing_subscriber::EnvFilter;

use crate::errors::{LauncherError, Result};

const LOG_FILE_PREFIX: &str = "library.log";
const FILTER_ENV: &str = "LAUNCHER_LOG";
const DEFAULT_DIRECTIVES: &str = "launcher_library=info,warn";

static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// `LAUNCHER_LOG`, then `RUST_LOG`, then library events at info and
/// everything else at warn.
fn library_filter() -> EnvFilter {
    EnvFilter::try_from_env(FILTER_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Installs the global subscriber writing to a daily `library.log` in
/// `log_dir`. Calling it a second time returns a `Config` error and leaves
/// the first subscriber in place.
pub fn init(log_dir: &Path) -> Result<()> {
    fs::create_dir_all(log_dir)?;

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX));
    let subscriber = Subscriber::builder()
        .with_env_filter(library_filter())
        .with_writer(writer)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        return Err(LauncherError::Config(format!("logging already initialised: {err}")));
    }
    // The guard only matters for the subscriber that won.
    let _ = LOG_GUARD.set(guard);
    Ok(())
}
