//! Apply command implementation
//!
//! The apply command runs the whole reconciliation:
//! 1. Load the configuration and record its modification time
//! 2. Validate settings, reserved keys and template markers
//! 3. Process every cluster concurrently
//! 4. Print one summary per cluster

use std::time::Instant;

use anyhow::Result;
use clap::Args;

use fkt::output::{emoji, OutputConfig};
use fkt::reconcile::Reconciler;

use crate::cli::GlobalArgs;
use crate::commands::{self, ConfigArgs};

/// Arguments for the apply command
#[derive(Args, Debug)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Detect changes without making them; any change is an error
    #[arg(short = 'n', long, env = "DRY_RUN")]
    pub dry_run: bool,

    /// List every file in the summary
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the apply command
pub fn execute(args: ApplyArgs, globals: &GlobalArgs) -> Result<()> {
    let start_time = Instant::now();
    let out = OutputConfig::from_env_and_flag(&globals.color);

    let config = commands::load(&args.config, args.dry_run, globals)?;
    let dry_run = config.settings.dry_run;
    let reconciler = Reconciler::new(config);

    if !args.quiet && dry_run {
        println!(
            "{} DRY RUN MODE - No changes will be made",
            emoji(&out, "🔎", "[DRY-RUN]")
        );
    }

    let failed = |e: fkt::error::Error| {
        if dry_run {
            fkt::suggestions::plan_failed(e)
        } else {
            e.into()
        }
    };

    reconciler.validate().map_err(failed)?;
    let summary = reconciler.run()?;

    if !args.quiet {
        commands::print_reports(&out, &summary.reports, args.verbose);
    }

    match summary.into_result() {
        Ok(reports) => {
            if !args.quiet {
                let changes: usize = reports.iter().map(|r| r.changes()).sum();
                println!(
                    "{} Applied {} cluster(s), {} change(s) in {:.2}s",
                    emoji(&out, "✅", "[OK]"),
                    reports.len(),
                    changes,
                    start_time.elapsed().as_secs_f64()
                );
            }
            Ok(())
        }
        Err(e) => {
            if !args.quiet {
                println!("{} Apply failed", emoji(&out, "❌", "[ERR]"));
            }
            Err(failed(e))
        }
    }
}
