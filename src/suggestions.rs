//! # Error Suggestions
//!
//! This module provides helper functions for generating helpful error
//! messages with hints and suggestions. Following CLI recommendations,
//! errors should tell users what went wrong AND how to fix it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fkt::suggestions;
//!
//! // Instead of:
//! anyhow::bail!("Configuration file not found: {}", path.display());
//!
//! // Use:
//! return Err(suggestions::config_not_found(path));
//! ```

use std::path::Path;

use crate::error::Error;

/// Generate an error for when the configuration file is not found.
///
/// Includes hints about:
/// - Creating a new config file
/// - Using the -f/--config flag
/// - Using the CONFIG_FILE environment variable
pub fn config_not_found(path: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "Configuration file not found: {path}\n\n\
         hint: Create a {default} file with 'settings', 'values' and 'clusters' sections\n\
         hint: Use -f/--config to specify a different path\n\
         hint: Set CONFIG_FILE environment variable",
        path = path.display(),
        default = crate::defaults::CONFIG_FILE
    )
}

/// Wrap a failed plan with a hint about applying the changes.
///
/// Only adds the hint when every failure is a dry-run violation.
pub fn plan_failed(error: Error) -> anyhow::Error {
    if error.is_dry_run_violation() {
        anyhow::anyhow!(
            "{error}\n\n\
             hint: The target tree is out of date; run 'fkt apply' to update it"
        )
    } else {
        error.into()
    }
}

/// Hint for a missing external tool.
pub fn tool_not_found_hint(tool: &str) -> String {
    match tool {
        "sops" => "hint: Install sops (https://github.com/getsops/sops) and age (https://github.com/FiloSottile/age)".to_string(),
        other => format!("hint: Make sure '{other}' is installed and on PATH"),
    }
}

/// Build a " (did you mean 'x'?)" suffix for a close match of `input`.
pub fn did_you_mean(input: &str, candidates: &[&str]) -> String {
    find_similar(input, candidates)
        .map(|s| format!(" (did you mean '{s}'?)"))
        .unwrap_or_default()
}

/// Find a similar string from a list of candidates using edit distance.
///
/// Returns Some(candidate) if a close match is found (edit distance <= 2).
fn find_similar<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|&candidate| {
            let distance = edit_distance(input, candidate);
            if distance <= 2 && distance < input.len() {
                Some((candidate, distance))
            } else {
                None
            }
        })
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}

/// Calculate the Levenshtein edit distance between two strings.
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.iter().enumerate() {
        let mut current = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        previous = current;
    }
    previous[b.len()]
}
