//! Observability setup.
//!
//! The library only emits `tracing` events and `metrics` counters; a binary
//! decides where they go. [`init`] installs the process-wide `tracing`
//! subscriber. No metrics recorder is installed, so counters are no-ops
//! unless the embedding application installs one.

mod logging;

pub use logging::{LOG_ENV, LogFormat, LoggingConfig};

use crate::config::LoggingSettings;
use crate::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, Registry};

static OBSERVABILITY_INIT: OnceLock<()> = OnceLock::new();

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initializes logging from config settings with env overrides.
///
/// # Errors
///
/// Returns an error if logging has already been initialized or the log
/// file cannot be opened.
pub fn init_from_settings(settings: &LoggingSettings, verbose: bool) -> Result<()> {
    init(LoggingConfig::from_settings(settings, verbose))
}

/// Installs the global `tracing` subscriber.
///
/// Events go to the configured log file, or to stderr so they never mix
/// with command output on stdout.
///
/// # Errors
///
/// Returns an error if logging has already been initialized or the log
/// file cannot be opened.
pub fn init(config: LoggingConfig) -> Result<()> {
    if OBSERVABILITY_INIT.get().is_some() {
        return Err(init_error("observability already initialized"));
    }

    let (writer, ansi) = match &config.file {
        Some(path) => (BoxMakeWriter::new(Mutex::new(open_log_file(path)?)), false),
        None => (BoxMakeWriter::new(io::stderr), true),
    };

    tracing_subscriber::registry()
        .with(fmt_layer(config.format, writer, ansi))
        .with(config.filter)
        .try_init()
        .map_err(init_error)?;

    OBSERVABILITY_INIT
        .set(())
        .map_err(|()| init_error("failed to mark observability initialized"))
}

/// Builds the formatting layer for `format`.
fn fmt_layer(format: LogFormat, writer: BoxMakeWriter, ansi: bool) -> BoxedLayer {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true);

    match format {
        LogFormat::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
    }
}

/// Opens a log file for appending, creating its directory.
fn open_log_file(path: &Path) -> Result<File> {
    let io_error = |operation: &str, e: io::Error| Error::OperationFailed {
        operation: operation.to_string(),
        cause: format!("{}: {e}", path.display()),
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| io_error("create_log_dir", e))?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_error("open_log_file", e))
}

fn init_error(cause: impl ToString) -> Error {
    Error::OperationFailed {
        operation: "observability_init".to_string(),
        cause: cause.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_log_file_appends() {
        let dir = tempfile::TempDir::new().expect("tempdir failed");
        let path = dir.path().join("logs").join("vecstore.log");

        let mut file = open_log_file(&path).expect("open failed");
        file.write_all(b"first\n").expect("write failed");

        let mut again = open_log_file(&path).expect("open failed");
        again.write_all(b"second\n").expect("write failed");

        let contents = std::fs::read_to_string(&path).expect("read failed");
        assert_eq!(contents, "first\nsecond\n");
    }

    #[test]
    fn test_fmt_layer_builds_for_each_format() {
        let _json = fmt_layer(LogFormat::Json, BoxMakeWriter::new(io::sink), false);
        let _pretty = fmt_layer(LogFormat::Pretty, BoxMakeWriter::new(io::sink), true);
    }
}
