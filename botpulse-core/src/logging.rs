//! File logging for botpulse
//!
//! Events go to `$XDG_STATE_HOME/botpulse/botpulse.log.<date>`, one file per
//! UTC day. Nothing is printed to the terminal, so `botpulse watch` output
//! stays readable while logging is on.

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_PREFIX: &str = "botpulse.log";

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `logging.level`. Fails if a subscriber is already
/// installed or the state directory cannot be created.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let log_dir = Config::state_dir();
    std::fs::create_dir_all(&log_dir)?;

    let appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| Error::Config(format!("invalid logging.level {:?}: {}", config.level, e)))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .try_init()
        .map_err(|e| Error::Config(format!("failed to install logger: {}", e)))?;

    tracing::info!(
        file = %log_file_path().display(),
        level = %config.level,
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Flushes pending log lines when dropped
pub struct LoggingGuard {
    _guard: WorkerGuard,
}

/// File today's events are appended to
pub fn log_file_path() -> PathBuf {
    let today = chrono::Utc::now().format("%Y-%m-%d");
    Config::state_dir().join(format!("{}.{}", LOG_PREFIX, today))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_path_is_dated() {
        let path = log_file_path();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();

        assert!(path.starts_with(Config::state_dir()));
        assert!(name.starts_with("botpulse.log."));
        let date = name.trim_start_matches("botpulse.log.");
        assert!(chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok());
    }
}
