//! # Logging Setup
//!
//! The library itself only logs through the `log` facade. Binaries call
//! [`init_tracing`] once at startup: it installs a `tracing-subscriber`
//! registry with an `EnvFilter`, a console layer and, when a directory is
//! given, a JSON file layer rotated daily by `tracing-appender`. `log` records
//! from the engine are bridged into the same subscriber.

use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("Invalid log filter '{filter}': {message}")]
    Filter { filter: String, message: String },

    #[error("Failed to install the tracing subscriber: {0}")]
    Init(String),
}

#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Used as the log file prefix.
    pub app_name: String,
    /// Filter directive used when `RUST_LOG` is not set, e.g. `info`.
    pub level: String,
    /// Directory for the daily JSON log files; `None` logs to the console only.
    pub log_dir: Option<PathBuf>,
    pub ansi: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            app_name: "seawatch".to_string(),
            level: "info".to_string(),
            log_dir: None,
            ansi: true,
        }
    }
}

/// Installs the global subscriber. Keep the returned guard alive for the
/// lifetime of the program or buffered file output is lost.
pub fn init_tracing(options: &LogOptions) -> Result<Option<WorkerGuard>, LoggerError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&options.level).map_err(|e| LoggerError::Filter {
            filter: options.level.clone(),
            message: e.to_string(),
        })?,
    };
    let console_layer = fmt::layer().with_target(true).with_ansi(options.ansi);

    let (file_layer, guard) = match &options.log_dir {
        Some(dir) => {
            let file_appender = rolling::daily(dir, &options.app_name);
            let (writer, guard) = non_blocking(file_appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer).json();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggerError::Init(e.to_string()))?;

    tracing::info!("Logging initialized with level: {}", options.level);
    Ok(guard)
}
