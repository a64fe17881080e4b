use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use keel_config::{LogFormat, LoggingConfig};
use tracing_appender::rolling;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info";
const LOG_FILE_PREFIX: &str = "keel.log";
const SECS_PER_DAY: u64 = 86_400;

/// Return the log directory path.
///
/// Precedence: `KEEL_LOG_DIR` env var > `logging.dir` > platform default.
/// Linux: `$XDG_DATA_HOME/keel/logs/` or `~/.local/share/keel/logs/`
pub fn log_dir(config: &LoggingConfig) -> PathBuf {
    if let Ok(dir) = std::env::var("KEEL_LOG_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(dir) = &config.dir {
        return dir.clone();
    }

    if let Some(data) = dirs::data_dir() {
        return data.join("keel").join("logs");
    }

    PathBuf::from("logs")
}

/// Remove KEEL log files older than `max_age_days` from the given directory.
///
/// Only files starting with the rolling appender's prefix are touched, in
/// case the directory is shared. A retention too large to represent as a
/// point in time keeps everything.
fn cleanup_old_logs(log_path: &Path, max_age_days: u64) {
    let Some(cutoff) = max_age_days
        .checked_mul(SECS_PER_DAY)
        .and_then(|secs| SystemTime::now().checked_sub(Duration::from_secs(secs)))
    else {
        tracing::debug!(max_age_days, "log retention out of range, skipping cleanup");
        return;
    };
    let Ok(entries) = std::fs::read_dir(log_path) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(LOG_FILE_PREFIX) {
            continue;
        }
        let modified = entry.metadata().and_then(|meta| meta.modified());
        if matches!(modified, Ok(modified) if modified < cutoff) {
            let _ = std::fs::remove_file(entry.path());
        }
    }
}

/// Build the level filter.
///
/// Precedence: `KEEL_LOG` > `RUST_LOG` > `logging.filter` > `info`.
fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_env("KEEL_LOG")
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .or_else(|_| EnvFilter::try_new(config.filter.as_deref().unwrap_or(DEFAULT_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize the global tracing subscriber.
///
/// Always logs to stderr (plain or JSON per `logging.format`). With
/// `logging.file` set, also writes daily-rotated files to [`log_dir`] and
/// prunes files older than `logging.retention_days`.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config);

    let json = config.format == LogFormat::Json;
    let plain_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
    });
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
    });

    let file_layer = if config.file {
        let log_path = log_dir(config);
        std::fs::create_dir_all(&log_path).with_context(|| {
            format!("failed to create log directory {}", log_path.display())
        })?;
        cleanup_old_logs(&log_path, config.retention_days);

        let file_appender = rolling::daily(&log_path, LOG_FILE_PREFIX);
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(plain_layer)
        .with(json_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    tracing::debug!(format = ?config.format, file = config.file, "logging initialized");
    Ok(())
}
