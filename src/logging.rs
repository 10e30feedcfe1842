use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "renshu.log";

/// Keeps the background file writer alive; dropping it flushes the log.
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub filter: String,
    /// Directory for the daily rolling file, `None` for stdout only.
    pub file_dir: Option<PathBuf>,
}

impl LogSettings {
    /// `filter` usually comes from `RUST_LOG`. File output is opt-in through
    /// `ENABLE_FILE_LOGS`, placed under `LOG_DIR` (default `./logs`).
    pub fn from_env(filter: &str) -> Self {
        Self::from_values(
            filter,
            std::env::var("ENABLE_FILE_LOGS").ok().as_deref(),
            std::env::var("LOG_DIR").ok().as_deref(),
        )
    }

    fn from_values(filter: &str, enable_files: Option<&str>, log_dir: Option<&str>) -> Self {
        let enabled = matches!(enable_files.map(str::trim), Some("true") | Some("1"));
        let file_dir = enabled.then(|| {
            log_dir
                .map(str::trim)
                .filter(|dir| !dir.is_empty())
                .unwrap_or("./logs")
                .into()
        });
        Self {
            filter: filter.to_string(),
            file_dir,
        }
    }
}

pub fn init_tracing(settings: &LogSettings) -> Option<FileLogGuard> {
    let env_filter = EnvFilter::try_new(&settings.filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let mut guard = None;
    let file_layer = settings.file_dir.as_ref().and_then(|dir| match std::fs::create_dir_all(dir) {
        Ok(()) => {
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
            let (writer, worker) = tracing_appender::non_blocking(appender);
            guard = Some(FileLogGuard { _guard: worker });
            Some(fmt::layer().with_writer(writer).with_ansi(false).with_target(true))
        }
        Err(err) => {
            eprintln!("log directory {} unusable, logging to stdout only: {err}", dir.display());
            None
        }
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .with(file_layer)
        .init();

    if let Some(dir) = settings.file_dir.as_ref().filter(|_| guard.is_some()) {
        tracing::info!(log_dir = %dir.display(), "file logging enabled");
    }
    guard
}
