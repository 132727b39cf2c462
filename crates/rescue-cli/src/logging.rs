use std::env::VarError;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use clap::ValueEnum;
use tracing::warn;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogFormat {
    Human,
    Json,
}

impl LogFormat {
    const ENV_KEY: &'static str = "RESCUE_LOG_FORMAT";

    pub(crate) fn parse(raw: &str) -> Result<Self> {
        <Self as ValueEnum>::from_str(raw.trim(), true).map_err(|_| {
            anyhow!(
                "invalid {key}={raw:?}; expected one of: human, json",
                key = Self::ENV_KEY
            )
        })
    }

    fn from_env() -> Result<Option<Self>> {
        match std::env::var(Self::ENV_KEY) {
            Ok(value) => Ok(Some(Self::parse(&value)?)),
            Err(VarError::NotPresent) => Ok(None),
            Err(VarError::NotUnicode(_)) => {
                bail!("{key} contains non-UTF-8 bytes", key = Self::ENV_KEY)
            }
        }
    }
}

fn default_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn open_session_log(path: &Path) -> io::Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::OpenOptions::new().create(true).append(true).open(path)
}

/// Sends events to the session's temporary log so completion can copy them
/// to durable storage. Falls back to stderr when that file can't be opened.
pub(crate) fn init_logging(temporary_log: &Path) -> Result<LogFormat> {
    let (format, format_error) = match LogFormat::from_env() {
        Ok(format) => (format.unwrap_or(LogFormat::Human), None),
        Err(err) => (LogFormat::Human, Some(err)),
    };

    let (writer, ansi, open_error) = match open_session_log(temporary_log) {
        Ok(file) => (BoxMakeWriter::new(Mutex::new(file)), false, None),
        Err(err) => (BoxMakeWriter::new(io::stderr), true, Some(err)),
    };

    match format {
        LogFormat::Human => tracing_subscriber::fmt()
            .with_env_filter(default_env_filter())
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(true)
            .with_level(true)
            .compact()
            .try_init()
            .map_err(|err| anyhow!("failed to initialize human logger: {err}"))?,
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(true)
            .with_env_filter(default_env_filter())
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
            .with_level(true)
            .try_init()
            .map_err(|err| anyhow!("failed to initialize JSON logger: {err}"))?,
    }

    if let Some(err) = format_error {
        warn!(error = %err, "falling back to human log format");
    }
    if let Some(err) = open_error {
        warn!(
            error = %err,
            path = %temporary_log.display(),
            "temporary log unavailable; logging to stderr"
        );
    }
    Ok(format)
}
