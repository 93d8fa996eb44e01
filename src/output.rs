//! # Output Configuration
//!
//! This module provides utilities for controlling CLI output appearance,
//! including color and emoji support based on terminal capabilities and
//! user preferences, and the rendering of per-cluster reports.
//!
//! ## Respecting User Preferences
//!
//! The module respects the following environment variables and flags:
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fkt::output::{OutputConfig, emoji};
//!
//! let config = OutputConfig::from_env_and_flag("auto");
//!
//! // Use emoji helper that respects config
//! println!("{} Processing...", emoji(&config, "🔍", "[SCAN]"));
//! ```

use std::env;
use std::fmt::Write;

use console::style;

use crate::report::{Action, ClusterReport};

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// # Arguments
    /// * `color_flag` - The value of the --color CLI flag: "always", "never", or "auto"
    ///
    /// In auto mode, colors are disabled if:
    /// - `NO_COLOR` environment variable is set (any value, including empty)
    /// - `CLICOLOR=0` is set
    /// - `TERM=dumb` is set
    /// - stdout is not a TTY (unless `CLICOLOR_FORCE=1`)
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    /// Detect whether color output is supported based on environment.
    fn detect_color_support() -> bool {
        // The presence of the variable (even if empty) disables colors
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    /// Create a configuration with colors always enabled.
    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    /// Create a configuration with colors always disabled.
    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Returns the appropriate string based on color configuration.
///
/// When colors are enabled, returns the emoji. When disabled, returns
/// the plain text alternative.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

fn action_label(config: &OutputConfig, action: &Action) -> String {
    let label = format!("{:>13}", action.label());
    if !config.use_color {
        return label;
    }
    match action {
        Action::Rendered(_) | Action::Kustomization(_) | Action::Created(_) => {
            style(label).green().to_string()
        }
        Action::Pruned(_) => style(label).red().to_string(),
        Action::Skipped(_) | Action::Unchanged(_) => style(label).dim().to_string(),
    }
}

/// Format a cluster report.
///
/// Without `verbose` only the summary line is produced; skipped and
/// unchanged files are listed only in verbose mode.
pub fn format_report(config: &OutputConfig, report: &ClusterReport, verbose: bool) -> String {
    let mut out = String::new();
    let cluster = if config.use_color {
        style(&report.cluster).bold().to_string()
    } else {
        report.cluster.clone()
    };
    let _ = writeln!(
        out,
        "{} {}: {} rendered, {} skipped, {} pruned",
        emoji(config, "📦", "[CLUSTER]"),
        cluster,
        report.count("rendered"),
        report.count("skipped"),
        report.count("pruned"),
    );

    if verbose {
        for action in &report.actions {
            let _ = writeln!(
                out,
                "  {} {}",
                action_label(config, action),
                crate::path::relative_display(action.path())
            );
        }
    }
    out
}
