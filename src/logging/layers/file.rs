//! Optional file sink for the `[logging]` section.
//!
//! Logs always belong to a scenario: the default directory is
//! `<scenario root>/.playcheck/logs`, and a relative `logging.log_dir` is
//! taken relative to the scenario root and may not climb out of it.

use crate::logging::config::LoggingConfig;
use crate::Result;
use anyhow::{bail, Context};
use std::fs::create_dir_all;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{self as tracing_fmt, format, writer::BoxMakeWriter};
use tracing_subscriber::registry::LookupSpan;

pub const LOG_FILE_NAME: &str = "playcheck.log";
const DEFAULT_LOG_DIR: &str = ".playcheck/logs";

pub type FileFmtLayer<S> =
    tracing_fmt::Layer<S, format::DefaultFields, format::Format<format::Full>, BoxMakeWriter>;

pub type FileLayerStack<S> = tracing_subscriber::layer::Layered<FileFmtLayer<S>, S>;

/// Directory the file sink writes to for the scenario at `scenario_root`.
pub fn log_dir(config: &LoggingConfig, scenario_root: &Path) -> Result<PathBuf> {
    match &config.log_dir {
        None => Ok(scenario_root.join(DEFAULT_LOG_DIR)),
        Some(dir) if dir.is_absolute() => Ok(dir.clone()),
        Some(dir) => {
            if dir.components().any(|part| matches!(part, Component::ParentDir)) {
                bail!(
                    "logging.log_dir `{}` leaves the scenario root {}",
                    dir.display(),
                    scenario_root.display()
                );
            }
            Ok(scenario_root.join(dir))
        }
    }
}

/// File layer writing to `directory/playcheck.log`, or a discarding layer
/// when `directory` is `None` so the subscriber type does not change.
pub fn file_layer<S>(directory: Option<&Path>) -> Result<(FileFmtLayer<S>, Option<WorkerGuard>)>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let Some(directory) = directory else {
        return Ok((make_layer(BoxMakeWriter::new(io::sink)), None));
    };

    create_dir_all(directory)
        .with_context(|| format!("failed to create log directory {}", directory.display()))?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE_NAME)
        .build(directory)
        .with_context(|| format!("failed to open {} in {}", LOG_FILE_NAME, directory.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(appender);
    Ok((make_layer(BoxMakeWriter::new(writer)), Some(guard)))
}

fn make_layer<S>(writer: BoxMakeWriter) -> FileFmtLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
}
