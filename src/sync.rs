//! # Tree Synchronizer
//!
//! Mirrors a template origin directory into a target directory. Files are
//! rendered through the [`Renderer`], subdirectories are synchronized
//! recursively and target entries without an origin counterpart are pruned.
//!
//! An unmanaged tree is only ensured to exist; its content is never touched.
//!
//! In dry-run mode the first change a normal run would make (a missing
//! directory, a modified file, an orphan) is returned as
//! [`Error::DryRunViolation`] and nothing is mutated.

use std::collections::BTreeSet;
use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::time::SystemTime;

use log::{debug, info};

use crate::error::{Error, Result};
use crate::filesystem::{self, EntryKind};
use crate::kustomization::contains_marker;
use crate::path::relative_display;
use crate::render::{RenderOutcome, Renderer};
use crate::report::{Action, ClusterReport};
use crate::secrets::SecretsEnvelope;
use crate::values::Values;

/// Maximum directory nesting below a template origin.
pub const MAX_DEPTH: usize = 64;

/// Synchronizes template trees into target trees
pub struct Synchronizer<'a> {
    renderer: Renderer<'a>,
    config_modified: SystemTime,
}

impl<'a> Synchronizer<'a> {
    pub fn new(renderer: Renderer<'a>, config_modified: SystemTime) -> Self {
        Self {
            renderer,
            config_modified,
        }
    }

    pub fn dry_run(&self) -> bool {
        self.renderer.dry_run()
    }

    /// Synchronize `origin` into `target`.
    pub fn sync(
        &self,
        origin: &Path,
        target: &Path,
        context: &Values,
        secrets: &SecretsEnvelope,
        managed: bool,
        report: &mut ClusterReport,
    ) -> Result<()> {
        if !managed {
            debug!("Unmanaged, skipping templating: {}", relative_display(target));
            return ensure_directory(target, self.dry_run(), report);
        }

        validate_origin(origin)?;
        self.sync_dir(origin, target, context, secrets, report, 0)
    }

    fn sync_dir(
        &self,
        origin: &Path,
        target: &Path,
        context: &Values,
        secrets: &SecretsEnvelope,
        report: &mut ClusterReport,
        depth: usize,
    ) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(Error::ConfigValidation {
                message: format!(
                    "template tree nested deeper than {} levels: {}",
                    MAX_DEPTH,
                    relative_display(origin)
                ),
            });
        }
        ensure_directory(target, self.dry_run(), report)?;

        let entries = filesystem::list_entries(origin, true)?;
        for entry in &entries {
            let target_path = target.join(&entry.name);
            match entry.kind {
                EntryKind::Directory => {
                    self.sync_dir(&entry.path, &target_path, context, secrets, report, depth + 1)?;
                }
                EntryKind::File => {
                    if filesystem::entry_kind(&target_path)? == Some(EntryKind::Directory) {
                        self.remove(&target_path, "would be replaced by a file", report)?;
                    }
                    let outcome = self.renderer.render(
                        &entry.path,
                        &target_path,
                        context,
                        secrets,
                        self.config_modified,
                    )?;
                    report.record(match outcome {
                        RenderOutcome::Written => Action::Rendered(target_path),
                        RenderOutcome::Unchanged => Action::Unchanged(target_path),
                        RenderOutcome::Skipped => Action::Skipped(target_path),
                    });
                }
            }
        }

        let keep: BTreeSet<OsString> = entries.into_iter().map(|e| e.name).collect();
        prune_orphans(target, &keep, &[], false, self.dry_run(), report)
    }

    fn remove(&self, path: &Path, change: &str, report: &mut ClusterReport) -> Result<()> {
        if self.dry_run() {
            return Err(Error::dry_run(path, change));
        }
        filesystem::remove_entry(path)?;
        report.record(Action::Pruned(path.to_path_buf()));
        Ok(())
    }
}

/// Check that `origin` is a directory holding a kustomization marker.
pub fn validate_origin(origin: &Path) -> Result<()> {
    if !origin.is_dir() {
        return Err(Error::ConfigValidation {
            message: format!(
                "template directory does not exist: {}",
                relative_display(origin)
            ),
        });
    }
    if !contains_marker(origin) {
        return Err(Error::MissingMarker {
            path: origin.to_path_buf(),
        });
    }
    Ok(())
}

/// Make sure `path` is a directory.
///
/// A file in its place is replaced. In dry-run any needed change is a
/// violation.
pub fn ensure_directory(path: &Path, dry_run: bool, report: &mut ClusterReport) -> Result<()> {
    match filesystem::entry_kind(path)? {
        Some(EntryKind::Directory) => Ok(()),
        Some(EntryKind::File) if dry_run => {
            Err(Error::dry_run(path, "would be replaced by a directory"))
        }
        None if dry_run => Err(Error::dry_run(path, "would be created")),
        existing => {
            if existing.is_some() {
                filesystem::remove_entry(path)?;
                report.record(Action::Pruned(path.to_path_buf()));
            }
            filesystem::ensure_dir(path)?;
            report.record(Action::Created(path.to_path_buf()));
            Ok(())
        }
    }
}

/// Remove entries of `dir` that are neither kept nor protected.
///
/// With `directories_only`, files are never considered orphans.
pub fn prune_orphans(
    dir: &Path,
    keep: &BTreeSet<OsString>,
    protected: &[String],
    directories_only: bool,
    dry_run: bool,
    report: &mut ClusterReport,
) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    for entry in filesystem::list_entries(dir, false)? {
        if keep.contains(&entry.name)
            || protected.iter().any(|p| OsStr::new(p) == entry.name)
            || (directories_only && entry.kind != EntryKind::Directory)
        {
            continue;
        }
        if dry_run {
            return Err(Error::dry_run(&entry.path, "would be pruned"));
        }
        filesystem::remove_entry(&entry.path)?;
        info!("Pruned {}", relative_display(&entry.path));
        report.record(Action::Pruned(entry.path));
    }
    Ok(())
}
