//! Sync plans
//!
//! A [`SyncPlan`] is the ordered, directional list of actions derived from
//! a diff, a filter and a direction. It is immutable once built; the
//! executor only reads it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::comparison::Side;
use super::conflict::{ConflictResolution, ResolutionSource, SyncConflict};

/// Assumed throughput for the rough time estimate (1 MiB/s)
pub const ESTIMATE_BYTES_PER_SEC: u64 = 1024 * 1024;

/// A path-level action on one side (deletion or folder creation)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PathAction {
    pub path: String,
    pub side: Side,
}

impl PathAction {
    pub fn new(path: impl Into<String>, side: Side) -> Self {
        Self {
            path: path.into(),
            side,
        }
    }

    pub fn local(path: impl Into<String>) -> Self {
        Self::new(path, Side::Local)
    }

    pub fn remote(path: impl Into<String>) -> Self {
        Self::new(path, Side::Remote)
    }
}

/// Local rename performed before a keep-both resolution syncs both versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictCopy {
    /// Original relative path; receives the remote version
    pub path: String,
    /// Relative path the local version is renamed to, then uploaded
    pub copy_path: String,
}

/// Record of a conflict that was settled while building the plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedResolution {
    pub path: String,
    pub resolution: ConflictResolution,
    pub source: ResolutionSource,
}

/// Ordered actions for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPlan {
    pub files_to_upload: Vec<String>,
    pub files_to_download: Vec<String>,
    pub files_to_delete: Vec<PathAction>,
    pub folders_to_create: Vec<PathAction>,
    pub folders_to_delete: Vec<PathAction>,
    pub conflict_copies: Vec<ConflictCopy>,
    /// Conflicts still awaiting a resolution; they generate no action
    pub conflicts: Vec<SyncConflict>,
    /// Conflicts settled during planning
    pub resolved: Vec<AppliedResolution>,
    pub total_upload_size: u64,
    pub total_download_size: u64,
    pub estimated_time: Duration,
}

impl SyncPlan {
    /// True when the plan has neither actions nor pending conflicts
    pub fn is_empty(&self) -> bool {
        self.total_operations() == 0 && self.conflicts.is_empty()
    }

    /// Number of discrete actions the executor will perform
    pub fn total_operations(&self) -> usize {
        self.conflict_copies.len()
            + self.folders_to_create.len()
            + self.files_to_upload.len()
            + self.files_to_download.len()
            + self.files_to_delete.len()
            + self.folders_to_delete.len()
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_upload_size + self.total_download_size
    }

    /// Recomputes the time estimate from the byte totals
    pub fn refresh_estimate(&mut self) {
        self.estimated_time = Duration::from_secs(self.total_bytes() / ESTIMATE_BYTES_PER_SEC);
    }

    /// Relative paths of every planned file deletion, any side
    pub fn deletion_paths(&self) -> Vec<&str> {
        self.files_to_delete.iter().map(|a| a.path.as_str()).collect()
    }

    /// True if any action writes to or removes from the local tree
    pub fn touches_local(&self) -> bool {
        !self.files_to_download.is_empty()
            || !self.conflict_copies.is_empty()
            || self.files_to_delete.iter().any(|a| a.side == Side::Local)
            || self.folders_to_delete.iter().any(|a| a.side == Side::Local)
    }

    /// True if `path` appears in any transfer or deletion list
    pub fn has_action_for(&self, path: &str) -> bool {
        self.files_to_upload.iter().any(|p| p == path)
            || self.files_to_download.iter().any(|p| p == path)
            || self.files_to_delete.iter().any(|a| a.path == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_plan() {
        let plan = SyncPlan::default();
        assert!(plan.is_empty());
        assert_eq!(plan.total_operations(), 0);
        assert!(!plan.touches_local());
    }

    #[test]
    fn test_operation_count_and_estimate() {
        let mut plan = SyncPlan {
            files_to_upload: vec!["a".into(), "b".into()],
            files_to_download: vec!["c".into()],
            files_to_delete: vec![PathAction::remote("d")],
            folders_to_create: vec![PathAction::remote("dir")],
            total_upload_size: 3 * 1024 * 1024,
            total_download_size: 1024 * 1024,
            ..Default::default()
        };
        plan.refresh_estimate();
        assert_eq!(plan.total_operations(), 5);
        assert_eq!(plan.estimated_time, Duration::from_secs(4));
        assert_eq!(plan.deletion_paths(), vec!["d"]);
        assert!(plan.touches_local());
        assert!(plan.has_action_for("c"));
        assert!(!plan.has_action_for("dir"));
    }
}
