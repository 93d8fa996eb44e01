//! # fkt CLI
//!
//! Binary entry point. Parses arguments with `clap`, runs the selected
//! command and maps the outcome to an exit code:
//!
//! - `0`: success
//! - `1`: any failure, including drift found by `plan`
//! - `2`: invalid command-line usage (reported by clap)
//!
//! All reconciliation logic lives in the `fkt` library crate.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    match cli.execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Library errors already embed their causes in the message.
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
