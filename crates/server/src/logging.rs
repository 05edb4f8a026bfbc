//! Logging setup
//!
//! Stderr always; a daily-rolling file as well when `logging.dir` is set.

use crate::config::LoggingConfig;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_FILE_PREFIX: &str = "xsshunter-server.log";

/// `RUST_LOG` wins over the configured level.
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

/// Initialize logging.
///
/// Returns a guard that must be held for the lifetime of the process when
/// file output is enabled, so buffered lines are flushed.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let (file_layer, guard) = match config.dir.as_deref() {
        Some(dir) => {
            let (writer, guard) = file_writer(dir);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(build_filter(config))
        .with(file_layer)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Some(dir) = &config.dir {
        tracing::info!("Logging initialized, log directory: {:?}", dir);
    }

    guard
}

fn file_writer(dir: &Path) -> (tracing_appender::non_blocking::NonBlocking, WorkerGuard) {
    std::fs::create_dir_all(dir).ok();
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    tracing_appender::non_blocking(appender)
}
