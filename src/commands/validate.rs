//! # Validate Command Implementation
//!
//! This module implements the `validate` subcommand, which checks the
//! configuration without rendering anything:
//!
//! - **Configuration Parsing**: The file decodes and every default applies.
//! - **Settings**: The base and template directories exist.
//! - **Reserved Keys**: No values define `Cluster`, `Resource` or `Secrets`.
//! - **Templates**: Every managed resource has a template directory holding a
//!   kustomization marker.
//!
//! This command is a safe, read-only operation that does not modify any files.

use anyhow::Result;
use clap::Args;

use fkt::output::{emoji, OutputConfig};
use fkt::reconcile::Reconciler;

use crate::cli::GlobalArgs;
use crate::commands::{self, ConfigArgs};

/// Validate an fkt configuration file
#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

/// Execute the `validate` command.
pub fn execute(args: ValidateArgs, globals: &GlobalArgs) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(&globals.color);
    println!(
        "{} Validating configuration: {}",
        emoji(&out, "🔍", "[SCAN]"),
        args.config.config.display()
    );

    let reconciler = Reconciler::new(commands::load(&args.config, false, globals)?);
    println!(
        "{} Configuration file parsed successfully",
        emoji(&out, "✅", "[OK]")
    );

    let config = reconciler.config();
    println!("\n{} Configuration Summary:", emoji(&out, "📊", "[INFO]"));
    println!("   Clusters: {}", config.clusters.len());
    let resources: usize = config.clusters.values().map(|c| c.resources.len()).sum();
    println!("   Resources: {}", resources);
    let unmanaged = config.clusters.values().filter(|c| !c.managed).count();
    if unmanaged > 0 {
        println!("   Unmanaged clusters: {}", unmanaged);
    }

    match reconciler.validate() {
        Ok(()) => {
            println!("\n{} Configuration is valid", emoji(&out, "✅", "[OK]"));
            Ok(())
        }
        Err(e) => {
            println!("\n{} Validation failed", emoji(&out, "❌", "[ERR]"));
            Err(e.into())
        }
    }
}
