//! Path utilities for cluster keys and user-facing path display

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Derive the relative target path of a cluster from its key.
///
/// Cluster keys are path-shaped (`aws/production/us-east-1/main`). The key is
/// split on `/` and every segment must be a plain name: no empty segments,
/// no `.` or `..`, and no leading `/`. The same key always yields the same
/// path, so each cluster owns a distinct subtree under the target root.
pub fn cluster_path(key: &str) -> Result<PathBuf> {
    if key.is_empty() {
        return Err(Error::ConfigValidation {
            message: "cluster key must not be empty".to_string(),
        });
    }
    if key.starts_with('/') || key.contains('\\') {
        return Err(Error::ConfigValidation {
            message: format!("cluster key must be a relative '/'-separated path: {}", key),
        });
    }

    let mut path = PathBuf::new();
    for segment in key.split('/') {
        if !is_plain_segment(segment) {
            return Err(Error::ConfigValidation {
                message: format!("invalid segment '{}' in cluster key: {}", segment, key),
            });
        }
        path.push(segment);
    }
    Ok(path)
}

/// Check that a resource name is a single plain path segment.
pub fn resource_segment(name: &str) -> Result<&str> {
    if !is_plain_segment(name) || name.contains('/') || name.contains('\\') {
        return Err(Error::ConfigValidation {
            message: format!("resource name must be a single path segment: '{}'", name),
        });
    }
    Ok(name)
}

fn is_plain_segment(segment: &str) -> bool {
    if segment.is_empty() || segment == "." || segment == ".." {
        return false;
    }
    let mut components = Path::new(segment).components();
    matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none()
}

/// Render `path` relative to the current working directory when possible.
///
/// Used for log and report output only; falls back to the path as given.
pub fn relative_display(path: &Path) -> String {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(&cwd).ok().map(Path::to_path_buf))
        .filter(|relative| !relative.as_os_str().is_empty())
        .unwrap_or_else(|| path.to_path_buf())
        .display()
        .to_string()
}
