use std::fs;
use std::path::Path;

use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::domain::config::LoggingConfig;
use crate::domain::DomainError;

const LOG_FILE_PREFIX: &str = "voicereport.log";

/// Console filter when `RUST_LOG` is unset: our crate at `level`, dependencies at warn.
pub fn filter_directive(level: &str) -> String {
    format!("voicereport={},warn", level)
}

/// Install the global subscriber.
///
/// Console output goes to stderr so stdout stays free for command output.
/// With file logging on, JSON lines also go to a daily file in `logs_dir`;
/// the returned guard flushes it on drop and must outlive all logging.
pub fn init_logging(
    logs_dir: &Path,
    config: &LoggingConfig,
) -> Result<Option<WorkerGuard>, DomainError> {
    let (file_layer, guard) = if config.file_logging {
        fs::create_dir_all(logs_dir)?;
        let appender = RollingFileAppender::new(Rotation::DAILY, logs_dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(EnvFilter::new(format!("voicereport={}", config.level)));
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(&config.level)));
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(console_filter);

    // A second install (tests, embedding) keeps the first subscriber.
    match tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
    {
        Ok(()) => info!(
            level = %config.level,
            file_logging = config.file_logging,
            logs_dir = ?logs_dir,
            "Logging initialized"
        ),
        Err(_) => debug!("Subscriber already installed"),
    }

    Ok(guard)
}
