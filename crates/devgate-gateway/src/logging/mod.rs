//! Centralized Logging Infrastructure
//!
//! Provides structured logging with:
//! - Per-connection spans for correlation
//! - Colored console output
//! - Optional file logging with daily rotation

mod trace_context;

pub use trace_context::ConnectionTrace;

use devgate_core::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "info,devgate_core=debug,devgate_gateway=debug";

/// Install the global subscriber
///
/// - Console: colored, compact
/// - File: daily rotation under `config.directory`, when set
///
/// Keep the returned guard alive for as long as file logs should be flushed.
/// Calling this twice leaves the first subscriber in place.
pub fn init_tracing(config: &LoggingConfig) -> Option<WorkerGuard> {
    // RUST_LOG takes precedence
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let console_layer = fmt::layer()
        .with_ansi(true)
        .compact()
        .with_thread_names(true)
        .with_line_number(false)
        .with_file(false)
        .with_target(true);

    let (file_layer, guard) = match file_writer(config) {
        Some((writer, guard)) => {
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_file(true)
                .with_target(true)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    guard
}

fn file_writer(
    config: &LoggingConfig,
) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let directory = config.directory.as_ref()?;

    if let Err(e) = std::fs::create_dir_all(directory) {
        eprintln!(
            "Warning: Failed to create logs directory {}: {}",
            directory.display(),
            e
        );
        return None;
    }

    // Creates files like: devgate.2026-01-22.log
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(&config.file_prefix)
        .filename_suffix("log")
        .build(directory);

    match appender {
        Ok(appender) => Some(tracing_appender::non_blocking(appender)),
        Err(e) => {
            eprintln!("Warning: Failed to create log file appender: {}", e);
            None
        }
    }
}

/// Default log directory under the platform data directory
pub fn default_log_directory() -> Option<std::path::PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join(devgate_core::constants::LOG_PREFIX).join("logs"))
}
