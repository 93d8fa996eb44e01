//! # Error Handling
//!
//! This module defines the centralized error type for `fkt`. It uses
//! `thiserror` to build a single `Error` enum covering every failure mode of
//! the reconciliation engine, each with enough context to tell the user which
//! cluster, resource or file went wrong.
//!
//! ## Taxonomy
//!
//! - **Configuration**: `ConfigParse`, `ConfigValidation`, `MissingMarker`,
//!   `ReservedKey` and `Configuration`. Validation errors are raised before
//!   any filesystem mutation.
//! - **Filesystem**: `Filesystem`, with the failing operation and path.
//! - **Rendering**: `Template`, carrying the template file name.
//! - **Secrets**: `Decryption`, `Encryption` and `ToolNotFound`.
//! - **Dry-run**: `DryRunViolation`, reporting a change that a normal run
//!   would have made.
//! - **Attribution**: `Resource` wraps an error with the cluster/resource it
//!   belongs to, and `Aggregate` collects the failures of a multi-cluster run.
//!
//! Dry-run violations travel through the same channel as real failures, so a
//! plan that finds drift and a plan that crashes both exit non-zero. Use
//! [`Error::is_dry_run_violation`] to tell them apart programmatically.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Main error type for fkt operations
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration file could not be decoded.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A required field is missing or a value is out of range.
    #[error("Configuration validation error: {message}")]
    ConfigValidation { message: String },

    /// A template origin does not contain a kustomization marker file.
    #[error("Configuration validation error: kustomization file does not exist in: {}", path.display())]
    MissingMarker { path: PathBuf },

    /// User values define a key the template context reserves.
    #[error("Configuration validation error: {scope} values define reserved key '{key}'")]
    ReservedKey { scope: String, key: String },

    /// The configuration is valid on its own but cannot satisfy a template.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A filesystem operation failed on a specific path.
    #[error("Filesystem error: cannot {operation} '{}': {source}", path.display())]
    Filesystem {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Template parsing or evaluation failed.
    ///
    /// May include the name of the problematic variable when applicable.
    #[error("Template processing error in {file}: {message}{}", variable.as_ref().map(|v| format!(" (variable: {})", v)).unwrap_or_default())]
    Template {
        file: String,
        message: String,
        /// The template variable that caused the error, if applicable
        variable: Option<String>,
    },

    /// The secrets file could not be decrypted or parsed.
    #[error("Decryption error for {}: {message}", path.display())]
    Decryption { path: PathBuf, message: String },

    /// A document could not be encrypted.
    #[error("Encryption error: {message}")]
    Encryption { message: String },

    /// The external encryption tool is not on PATH.
    #[error("Tool not found: {tool} - {message}")]
    ToolNotFound { tool: String, message: String },

    /// Dry-run detected a change a normal run would make.
    #[error("Dry-run violation: {} {change}", path.display())]
    DryRunViolation { path: PathBuf, change: String },

    /// An error attributed to a cluster resource.
    #[error("resource {resource}: {source}")]
    Resource {
        resource: String,
        #[source]
        source: Box<Error>,
    },

    /// Failures collected from independent units of work.
    #[error("{operation} failed for {} unit(s):{}", failures.len(), DisplayFailures(failures))]
    Aggregate {
        operation: String,
        failures: Vec<Failure>,
    },

    /// The worker pool could not be created.
    #[error("Worker pool error: {message}")]
    WorkerPool { message: String },

    /// A YAML error, wrapped from `serde_yaml::Error`.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// One failed unit of work inside an [`Error::Aggregate`].
#[derive(Debug)]
pub struct Failure {
    /// Cluster key, or `cluster/resource` for resource-level failures
    pub unit: String,
    pub error: Error,
}

impl Failure {
    pub fn new(unit: impl Into<String>, error: Error) -> Self {
        Self {
            unit: unit.into(),
            error,
        }
    }
}

struct DisplayFailures<'a>(&'a [Failure]);

impl fmt::Display for DisplayFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for failure in self.0 {
            write!(f, "\n  - {}: {}", failure.unit, failure.error)?;
        }
        Ok(())
    }
}

impl Error {
    /// Builds a `Filesystem` error for `operation` on `path`.
    pub fn filesystem(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Error::Filesystem {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Builds a `DryRunViolation` for `path`.
    pub fn dry_run(path: impl Into<PathBuf>, change: impl Into<String>) -> Self {
        Error::DryRunViolation {
            path: path.into(),
            change: change.into(),
        }
    }

    /// Wraps this error with the resource it happened in.
    pub fn in_resource(self, resource: impl Into<String>) -> Self {
        Error::Resource {
            resource: resource.into(),
            source: Box::new(self),
        }
    }

    /// Returns true when the error is, or only contains, dry-run violations.
    pub fn is_dry_run_violation(&self) -> bool {
        match self {
            Error::DryRunViolation { .. } => true,
            Error::Resource { source, .. } => source.is_dry_run_violation(),
            Error::Aggregate { failures, .. } => {
                !failures.is_empty() && failures.iter().all(|f| f.error.is_dry_run_violation())
            }
            _ => false,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
