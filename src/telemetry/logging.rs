//! Logging setup
//!
//! Structured logging through tracing. Console output always goes to stderr,
//! since the replay binary writes host events to stdout. An optional log file
//! is written through a non-blocking appender.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Filter directive variable, checked before `RUST_LOG`
pub const LOG_FILTER_ENV: &str = "AR_OVERLAY_LOG";

/// Set to `json` for JSON console output
pub const LOG_FORMAT_ENV: &str = "AR_OVERLAY_LOG_FORMAT";

/// Keeps the file writer flushing; hold it until shutdown
pub type LogGuard = WorkerGuard;

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub console_enabled: bool,
    /// Also write plain-text logs to this file
    pub file_path: Option<PathBuf>,
    pub json_format: bool,
    /// Filter used when neither environment variable is set
    pub default_level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            console_enabled: true,
            file_path: None,
            json_format: false,
            default_level: "info".to_string(),
        }
    }
}

impl LogConfig {
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_env(LOG_FILTER_ENV)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new(&self.default_level))
    }

    fn wants_json(&self) -> bool {
        match std::env::var(LOG_FORMAT_ENV) {
            Ok(format) => format.eq_ignore_ascii_case("json"),
            Err(_) => self.json_format,
        }
    }
}

/// Install the global subscriber
///
/// Returns the file writer guard when file logging is enabled. Fails if a
/// subscriber is already installed or the log file cannot be created.
///
/// ```no_run
/// use ar_video_overlay::telemetry::{init_logging, LogConfig};
///
/// let _guard = init_logging(&LogConfig::default()).expect("logging");
/// ```
pub fn init_logging(
    config: &LogConfig,
) -> Result<Option<LogGuard>, Box<dyn std::error::Error + Send + Sync>> {
    let json = config.wants_json();

    let (file_layer, guard) = match &config.file_path {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let console_json = (config.console_enabled && json).then(|| {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_thread_ids(true)
    });
    let console_text = (config.console_enabled && !json)
        .then(|| fmt::layer().with_writer(std::io::stderr).compact());

    tracing_subscriber::registry()
        .with(config.filter())
        .with(file_layer)
        .with(console_json)
        .with(console_text)
        .try_init()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        json,
        file = ?config.file_path,
        "Logging initialized"
    );

    Ok(guard)
}
