//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use fkt::config::{LogConfig, LogFormat, LogLevel};

use crate::commands;

/// fkt - Render GitOps cluster manifests from templates and layered values
#[derive(Parser, Debug)]
#[command(name = "fkt")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    globals: GlobalArgs,
}

/// Options shared by every subcommand
#[derive(clap::Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    pub color: String,

    /// Set log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true, value_name = "LEVEL", env = "LOG_LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Set log format (console, json)
    #[arg(long, global = true, value_name = "FORMAT", env = "LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    /// Append log records to this file instead of stderr
    #[arg(long, global = true, value_name = "PATH", env = "LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl GlobalArgs {
    /// Merge command-line log options over the `settings.log` block.
    pub fn log_config(&self, settings: &LogConfig) -> LogConfig {
        LogConfig {
            level: self.log_level.unwrap_or(settings.level),
            format: self.log_format.unwrap_or(settings.format),
            file: self.log_file.clone().or_else(|| settings.file.clone()),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render every cluster into the target directory
    Apply(commands::apply::ApplyArgs),

    /// Report what apply would change without touching the filesystem
    Plan(commands::plan::PlanArgs),

    /// Validate the configuration and template directories
    Validate(commands::validate::ValidateArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        match self.command {
            Commands::Apply(args) => commands::apply::execute(args, &self.globals),
            Commands::Plan(args) => commands::plan::execute(args, &self.globals),
            Commands::Validate(args) => commands::validate::execute(args, &self.globals),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_log_config_overrides() {
        let globals = GlobalArgs {
            color: "never".to_string(),
            log_level: Some(LogLevel::Trace),
            log_format: None,
            log_file: None,
        };
        let settings = LogConfig {
            level: LogLevel::Warn,
            format: LogFormat::Json,
            file: Some(PathBuf::from("fkt.log")),
        };

        let merged = globals.log_config(&settings);
        assert_eq!(merged.level, LogLevel::Trace);
        assert_eq!(merged.format, LogFormat::Json);
        assert_eq!(merged.file, Some(PathBuf::from("fkt.log")));
    }

    #[test]
    fn test_parse_plan_with_globals() {
        let cli = Cli::try_parse_from(["fkt", "plan", "--log-level", "debug", "-f", "x.yaml"]).unwrap();
        assert_eq!(cli.globals.log_level, Some(LogLevel::Debug));
        assert!(matches!(cli.command, Commands::Plan(_)));
    }
}
