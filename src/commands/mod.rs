//! # CLI Command Implementations
//!
//! Each subcommand of the `fkt` command-line tool lives in its own file with
//! an `Args` struct derived using `clap` and an `execute` function taking the
//! parsed arguments and the global options.
//!
//! The helpers in this module cover what every command shares: locating and
//! loading the configuration file, installing the logger and printing
//! cluster reports.

pub mod apply;
pub mod plan;
pub mod validate;

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use fkt::config::{self, Config, Overrides};
use fkt::output::{format_report, OutputConfig};
use fkt::report::ClusterReport;
use fkt::{defaults, logging, suggestions};

use crate::cli::GlobalArgs;

/// Options locating and overriding the configuration
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Path to the configuration file
    #[arg(
        short = 'f',
        long = "config",
        value_name = "PATH",
        env = "CONFIG_FILE",
        default_value = defaults::CONFIG_FILE
    )]
    pub config: PathBuf,

    /// Base directory for templates and targets (overrides settings.directories.base)
    #[arg(short, long, value_name = "DIR", env = "BASE_DIRECTORY")]
    pub base_directory: Option<PathBuf>,

    /// Number of clusters processed concurrently
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,
}

/// Load the configuration and install the logger it describes.
pub fn load(args: &ConfigArgs, dry_run: bool, globals: &GlobalArgs) -> Result<Config> {
    if !args.config.is_file() {
        return Err(suggestions::config_not_found(&args.config));
    }

    let overrides = Overrides {
        base_directory: args.base_directory.clone(),
        dry_run,
        jobs: args.jobs,
    };
    let config = config::load(&args.config, &overrides)?;

    logging::init(&globals.log_config(&config.settings.log))?;
    log::debug!(
        "Configuration {}: {} cluster(s), base directory {}",
        args.config.display(),
        config.clusters.len(),
        config.settings.directories.base.display()
    );
    Ok(config)
}

/// Print cluster reports to stdout.
pub fn print_reports(out: &OutputConfig, reports: &[ClusterReport], verbose: bool) {
    for report in reports {
        print!("{}", format_report(out, report, verbose));
    }
}
