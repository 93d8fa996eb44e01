//! Plan command implementation
//!
//! `fkt plan` is `fkt apply --dry-run`: every cluster is processed without
//! mutating the filesystem and any change a real run would make fails the
//! command.

use anyhow::Result;
use clap::Args;

use crate::cli::GlobalArgs;
use crate::commands::apply::{self, ApplyArgs};
use crate::commands::ConfigArgs;

/// Arguments for the plan command
#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// List every file in the summary
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the plan command
pub fn execute(args: PlanArgs, globals: &GlobalArgs) -> Result<()> {
    apply::execute(
        ApplyArgs {
            config: args.config,
            dry_run: true,
            verbose: args.verbose,
            quiet: args.quiet,
        },
        globals,
    )
}
