//! Per-cluster record of what a run did
//!
//! Each cluster task owns its [`ClusterReport`]; commands print the reports
//! after all tasks have joined, so output of concurrent clusters never
//! interleaves.

use std::fmt;
use std::path::PathBuf;

/// One observable effect on the target tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// A file was rendered and written
    Rendered(PathBuf),
    /// A YAML target was newer than all of its inputs
    Skipped(PathBuf),
    /// The rendered output matched the existing file
    Unchanged(PathBuf),
    /// An orphaned entry was removed
    Pruned(PathBuf),
    /// A directory was created
    Created(PathBuf),
    /// A kustomization manifest was written
    Kustomization(PathBuf),
}

impl Action {
    pub fn path(&self) -> &PathBuf {
        match self {
            Action::Rendered(p)
            | Action::Skipped(p)
            | Action::Unchanged(p)
            | Action::Pruned(p)
            | Action::Created(p)
            | Action::Kustomization(p) => p,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Action::Rendered(_) => "rendered",
            Action::Skipped(_) => "skipped",
            Action::Unchanged(_) => "unchanged",
            Action::Pruned(_) => "pruned",
            Action::Created(_) => "created",
            Action::Kustomization(_) => "kustomization",
        }
    }

    /// True for actions that modified the filesystem
    pub fn is_change(&self) -> bool {
        !matches!(self, Action::Skipped(_) | Action::Unchanged(_))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            self.label(),
            crate::path::relative_display(self.path())
        )
    }
}

/// Actions of one cluster task
#[derive(Debug, Clone, Default)]
pub struct ClusterReport {
    pub cluster: String,
    pub actions: Vec<Action>,
}

impl ClusterReport {
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            actions: Vec::new(),
        }
    }

    pub fn record(&mut self, action: Action) {
        log::debug!("[{}] {}", self.cluster, action);
        self.actions.push(action);
    }

    pub fn changes(&self) -> usize {
        self.actions.iter().filter(|a| a.is_change()).count()
    }

    pub fn count(&self, label: &str) -> usize {
        self.actions.iter().filter(|a| a.label() == label).count()
    }
}
