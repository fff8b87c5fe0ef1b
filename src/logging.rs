use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use time::macros::format_description;
use tracing::level_filters::LevelFilter;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::error::{Error, Result};

/// How the log context should be built.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Show debug output on the console.
    pub debug: bool,
    /// Append-only log file; `None` logs to the console only.
    pub file: Option<PathBuf>,
}

/// Console plus file logging for one invocation.
///
/// The subscriber is installed as the thread's default only while the
/// context is alive. Dropping it flushes the log file.
pub struct LogContext {
    file: Option<Arc<File>>,
    _guard: DefaultGuard,
}

impl LogContext {
    /// Build the subscriber: stderr at INFO (DEBUG with `debug`, `RUST_LOG`
    /// overrides) and the file at DEBUG.
    pub fn init(settings: &LogSettings) -> Result<Self> {
        let timer = UtcTime::new(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ));
        let console_level = if settings.debug {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        };
        let console_filter = EnvFilter::builder()
            .with_default_directive(console_level.into())
            .from_env_lossy();

        let console = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_timer(timer.clone())
            .with_filter(console_filter);

        let file = settings.file.as_deref().map(open_log_file).transpose()?;
        let file_layer = file.as_ref().map(|file| {
            fmt::layer()
                .with_writer(Arc::clone(file))
                .with_ansi(false)
                .with_target(false)
                .with_timer(timer)
                .with_filter(LevelFilter::DEBUG)
        });

        let subscriber = tracing_subscriber::registry().with(console).with(file_layer);
        let guard = tracing::subscriber::set_default(subscriber);

        Ok(Self {
            file,
            _guard: guard,
        })
    }
}

impl Drop for LogContext {
    fn drop(&mut self) {
        if let Some(file) = &self.file {
            let _ = (&**file).flush();
        }
    }
}

fn open_log_file(path: &Path) -> Result<Arc<File>> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(Arc::new)
        .map_err(|source| Error::OpenLogFile {
            path: path.to_path_buf(),
            source,
        })
}
