//! Logging setup for programs embedding steadymine.
//!
//! The library only emits `tracing` events; nothing is recorded until the
//! host program installs a subscriber. [`init`] installs one that writes to
//! a daily rotating file, filtered by `RUST_LOG`.

use std::path::PathBuf;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Default log level if RUST_LOG is not set.
const DEFAULT_LOG_FILTER: &str = "steadymine=info,warn";

/// File name prefix of the rotated logs.
const LOG_FILE_NAME: &str = "steadymine.log";

/// Install the global tracing subscriber.
///
/// Logs go to the platform-specific local data directory:
/// - Linux: `~/.local/share/steadymine/logs/`
/// - macOS: `~/Library/Application Support/steadymine/logs/`
/// - Windows: `C:\Users\<User>\AppData\Local\steadymine\logs\`
///
/// Retry failures are logged at `warn`, so the default filter keeps them.
/// Use `RUST_LOG=steadymine=debug` to also see requests and cache
/// invalidations, or `steadymine=trace` for cache hits and misses.
///
/// # Errors
///
/// Returns an error if the log directory cannot be determined or created,
/// or if a global subscriber is already installed.
///
/// # Example
///
/// ```no_run
/// steadymine::logging::init().expect("Failed to initialize logging");
/// ```
pub fn init() -> anyhow::Result<()> {
    let log_dir = get_log_directory()?;
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_NAME);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let subscriber = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true),
        )
        .with(filter);

    tracing::subscriber::set_global_default(subscriber)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "steadymine logging initialized");
    tracing::debug!(log_dir = %log_dir.display(), "Log directory");

    Ok(())
}

fn get_log_directory() -> anyhow::Result<PathBuf> {
    let base_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine local data directory"))?;

    Ok(base_dir.join("steadymine").join("logs"))
}

/// Where log files are written, if the platform has a data directory.
pub fn log_directory() -> Option<PathBuf> {
    get_log_directory().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_log_directory_has_expected_structure() {
        let dir = get_log_directory().unwrap();
        assert!(dir.ends_with("steadymine/logs"));
    }

    #[test]
    fn test_log_directory_public_function() {
        let dir = log_directory();
        assert!(dir.is_some());
        assert!(dir.unwrap().ends_with("steadymine/logs"));
    }

    #[test]
    #[serial]
    fn test_filter_falls_back_without_rust_log() {
        std::env::remove_var("RUST_LOG");
        assert!(EnvFilter::try_from_default_env().is_err());
        assert!(EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());

        std::env::set_var("RUST_LOG", "steadymine=trace");
        assert!(EnvFilter::try_from_default_env().is_ok());
        std::env::remove_var("RUST_LOG");
    }
}
