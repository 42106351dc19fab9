use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

#[derive(clap::ValueEnum, Copy, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        LevelFilter::from_level(level.into())
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LoggingOptions {
    pub console_level: LogLevel,
    pub file_level: LogLevel,
    /// Daily rotated log files are written here when set
    pub log_dir: Option<PathBuf>,
    pub journald: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            console_level: LogLevel::Info,
            file_level: LogLevel::Debug,
            log_dir: None,
            journald: false,
        }
    }
}

/// Keep the returned guard alive or buffered file logs are lost.
pub fn setup_logging(opts: &LoggingOptions) -> Option<WorkerGuard> {
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(LevelFilter::from(opts.console_level));

    let (file, guard) = match &opts.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "cloudcast.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(LevelFilter::from(opts.file_level));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let journald = if opts.journald {
        match tracing_journald::layer() {
            Ok(layer) => Some(layer.with_filter(LevelFilter::from(opts.console_level))),
            Err(e) => {
                eprintln!("journald unavailable: {e}");
                None
            }
        }
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .with(journald)
        .init();
    guard
}
