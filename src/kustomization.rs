//! Kustomization marker detection and aggregation manifests

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Serialize;

use crate::defaults::KUSTOMIZATION_FILE;
use crate::error::{Error, Result};
use crate::filesystem::{self, EntryKind};
use crate::path::relative_display;

/// File names that mark a directory as a kustomize resource root.
pub const MARKERS: [&str; 4] = [
    "kustomization",
    "Kustomization",
    "kustomization.yaml",
    "kustomization.yml",
];

pub const API_VERSION: &str = "kustomize.config.k8s.io/v1beta1";
pub const KIND: &str = "Kustomization";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Manifest<'a> {
    api_version: &'static str,
    kind: &'static str,
    common_annotations: &'a BTreeMap<String, String>,
    resources: &'a [String],
}

/// True if `dir` directly contains one of the [`MARKERS`] as a file.
pub fn contains_marker(dir: &Path) -> bool {
    MARKERS.iter().any(|marker| dir.join(marker).is_file())
}

/// Resource list for the manifest in `dir`.
///
/// `managed` names plus every child directory that contains a marker,
/// sorted lexicographically without duplicates. Children named in `exclude`
/// are never discovered.
pub fn resources(
    dir: &Path,
    managed: &[String],
    exclude: &BTreeSet<OsString>,
) -> Result<Vec<String>> {
    let mut resources: BTreeSet<String> = managed.iter().cloned().collect();

    if dir.is_dir() {
        for entry in filesystem::list_entries(dir, false)? {
            if entry.kind != EntryKind::Directory
                || exclude.contains(&entry.name)
                || !contains_marker(&entry.path)
            {
                continue;
            }
            if let Some(name) = entry.name.to_str() {
                if resources.insert(name.to_string()) {
                    debug!("Discovered resource {}", relative_display(&entry.path));
                }
            }
        }
    }
    Ok(resources.into_iter().collect())
}

/// Serialize a manifest, prefixed with a document separator.
pub fn manifest(annotations: &BTreeMap<String, String>, resources: &[String]) -> Result<String> {
    let yaml = serde_yaml::to_string(&Manifest {
        api_version: API_VERSION,
        kind: KIND,
        common_annotations: annotations,
        resources,
    })?;
    Ok(format!("---\n{}", yaml))
}

/// Write `dir/kustomization.yaml` listing the resources of `dir`.
///
/// Returns the manifest path, or `None` when there is nothing to list. In
/// dry-run mode nothing is written and a missing or differing manifest is
/// a [`Error::DryRunViolation`].
pub fn generate(
    dir: &Path,
    managed: &[String],
    exclude: &BTreeSet<OsString>,
    annotations: &BTreeMap<String, String>,
    dry_run: bool,
) -> Result<Option<PathBuf>> {
    let resources = resources(dir, managed, exclude)?;
    if resources.is_empty() {
        warn!(
            "No resources in {}, skipping kustomization",
            relative_display(dir)
        );
        return Ok(None);
    }

    let path = dir.join(KUSTOMIZATION_FILE);
    let content = manifest(annotations, &resources)?;

    if dry_run {
        return match filesystem::read_optional(&path)? {
            Some(existing) if existing == content.as_bytes() => Ok(Some(path)),
            Some(_) => Err(Error::dry_run(path, "would be modified")),
            None => Err(Error::dry_run(path, "would be created")),
        };
    }

    filesystem::write_atomic(&path, content.as_bytes())?;
    info!(
        "Generated {} ({} resources)",
        relative_display(&path),
        resources.len()
    );
    Ok(Some(path))
}
