//! Logger installation for the `fkt` binary
//!
//! The library logs through the `log` facade only. This module installs
//! `env_logger` with the configured level, either in its console format or as
//! JSON lines, writing to stderr or appending to a log file.

use std::fs::OpenOptions;
use std::io::Write;

use env_logger::{Builder, Target};
use log::LevelFilter;

use crate::config::{LogConfig, LogFormat, LogLevel};
use crate::error::{Error, Result};

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Off => LevelFilter::Off,
        }
    }
}

/// Build a logger for `config` without installing it.
pub fn builder(config: &LogConfig) -> Result<Builder> {
    let mut builder = Builder::new();
    builder.filter_level(config.level.into());

    if config.format == LogFormat::Json {
        builder.format(|buf, record| {
            let line = serde_json::json!({
                "time": buf.timestamp_millis().to_string(),
                "level": record.level().as_str(),
                "target": record.target(),
                "message": record.args().to_string(),
            });
            writeln!(buf, "{}", line)
        });
    }

    if let Some(path) = &config.file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::filesystem("open log file", path, e))?;
        builder.target(Target::Pipe(Box::new(file)));
        builder.write_style(env_logger::WriteStyle::Never);
    }
    Ok(builder)
}

/// Install the global logger.
pub fn init(config: &LogConfig) -> Result<()> {
    builder(config)?
        .try_init()
        .map_err(|e| Error::Configuration {
            message: format!("cannot install logger: {}", e),
        })
}
