//! Default values for fkt settings.
//!
//! This module provides centralized default values used by configuration
//! normalization and the CLI, ensuring consistency and avoiding duplication.

/// Default template root, relative to the base directory.
pub const TEMPLATES_DIRECTORY: &str = "templates";

/// Default target root, relative to the base directory.
pub const TARGET_DIRECTORY: &str = "clusters";

/// Default left template delimiter.
pub const DELIMITER_LEFT: &str = "[[[";

/// Default right template delimiter.
pub const DELIMITER_RIGHT: &str = "]]]";

/// Default secrets file name, looked up in each cluster's target directory.
pub const SECRETS_FILE: &str = "secrets.yaml";

/// Default configuration file name.
pub const CONFIG_FILE: &str = "fkt.yaml";

/// Name of the generated aggregation manifest.
pub const KUSTOMIZATION_FILE: &str = "kustomization.yaml";

/// Returns the default worker pool size.
///
/// Uses the available parallelism of the host and falls back to a single
/// worker when it cannot be determined.
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_jobs_is_positive() {
        assert!(default_jobs() >= 1);
    }

    #[test]
    fn test_default_delimiters_differ() {
        assert_ne!(DELIMITER_LEFT, DELIMITER_RIGHT);
    }
}
