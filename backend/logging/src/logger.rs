//! Structured Logger
//!
//! Wraps `tracing` to provide console output, a daily-rolling NDJSON file,
//! and environment-based level control.

use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log file prefix; the appender adds `.YYYY-MM-DD`.
pub const LOG_FILE_NAME: &str = "spoofbar.log";

/// Keeps the background file writer alive. Drop it last, on exit.
pub struct LoggerGuard {
    _file: WorkerGuard,
}

/// Initialize the global structured logger.
///
/// `RUST_LOG` wins over `level`. Creates `log_dir` if needed. Calling this a
/// second time leaves the first subscriber in place.
pub fn init_logger<P: AsRef<Path>>(log_dir: P, level: &str) -> Result<LoggerGuard> {
    let log_dir = log_dir.as_ref();
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_NAME);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_ansi(false);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(true);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    Ok(LoggerGuard { _file: guard })
}
