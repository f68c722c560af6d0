//! Plan builder
//!
//! Turns a [`TreeDiff`] into a [`SyncPlan`] for the profile's direction.
//! A genuine conflict produces no action until it is settled:
//! - [`PlanMode::Analysis`] only applies resolutions the caller recorded
//! - [`PlanMode::Execution`] also goes through rules, the default strategy
//!   and the callbacks of the [`ConflictResolver`]
//!
//! Anything left unsettled stays in `plan.conflicts`.
//!
//! | direction        | local only        | remote only        | both, different |
//! |------------------|-------------------|--------------------|-----------------|
//! | bidirectional    | upload            | download           | conflict        |
//! | local_to_remote  | upload            | delete remote (1)  | upload          |
//! | remote_to_local  | delete local (1)  | download           | download        |
//! | mirror_local     | upload            | delete remote      | upload          |
//! | mirror_remote    | delete local      | download           | download        |
//!
//! (1) only with `delete_orphans`

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info, warn};

use treesync_conflict::{ConflictDetector, ConflictNamer, ConflictResolver, Decision};
use treesync_core::domain::{
    ConflictCopy, ConflictResolution, FileComparison, PathAction, Side, SyncConfig, SyncDirection,
    SyncPlan,
};

use crate::diff::TreeDiff;
use crate::tree::parent_of;

/// How conflicts without a recorded resolution are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanMode {
    /// Listed in `plan.conflicts` for the caller to decide
    Analysis,
    /// Settled by rules, the default strategy or a callback where possible
    Execution,
}

/// Builds plans for one profile
pub struct PlanBuilder<'a> {
    config: &'a SyncConfig,
    resolver: &'a ConflictResolver,
    mode: PlanMode,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(config: &'a SyncConfig, resolver: &'a ConflictResolver, mode: PlanMode) -> Self {
        Self {
            config,
            resolver,
            mode,
        }
    }

    /// Builds the plan for `diff`
    ///
    /// `resolutions` holds decisions recorded by the caller for specific
    /// paths; they win over rules and the default strategy.
    pub fn build(
        &self,
        diff: &TreeDiff,
        resolutions: &HashMap<String, ConflictResolution>,
    ) -> SyncPlan {
        let direction = self.config.direction;
        let mut plan = SyncPlan::default();

        for comparison in diff.differences() {
            if ConflictDetector::requires_resolution(direction, comparison) {
                self.resolve_conflict(diff, comparison, resolutions, &mut plan);
                continue;
            }
            self.plan_difference(comparison, &mut plan);
        }

        self.plan_folders(diff, &mut plan);
        plan.refresh_estimate();

        info!(
            profile = %self.config.name,
            direction = %direction,
            mode = ?self.mode,
            uploads = plan.files_to_upload.len(),
            downloads = plan.files_to_download.len(),
            deletions = plan.files_to_delete.len(),
            folders_to_create = plan.folders_to_create.len(),
            folders_to_delete = plan.folders_to_delete.len(),
            conflicts = plan.conflicts.len(),
            "Sync plan built"
        );
        plan
    }

    fn upload(plan: &mut SyncPlan, path: &str, size: u64) {
        plan.files_to_upload.push(path.to_string());
        plan.total_upload_size += size;
    }

    fn download(plan: &mut SyncPlan, path: &str, size: u64) {
        plan.files_to_download.push(path.to_string());
        plan.total_download_size += size;
    }

    fn resolve_conflict(
        &self,
        diff: &TreeDiff,
        comparison: &FileComparison,
        resolutions: &HashMap<String, ConflictResolution>,
        plan: &mut SyncPlan,
    ) {
        let Some(conflict) = ConflictDetector::classify(comparison) else {
            return;
        };
        let preset = resolutions.get(&comparison.path).copied();
        if preset.is_none() && self.mode == PlanMode::Analysis {
            plan.conflicts.push(conflict);
            return;
        }

        match self.resolver.resolve(&conflict, preset) {
            Ok((decision, applied)) => {
                let path = comparison.path.as_str();
                match decision {
                    Decision::Upload => Self::upload(plan, path, comparison.local_size),
                    Decision::Download => Self::download(plan, path, comparison.remote_size),
                    Decision::RenameBoth => {
                        let copy_path =
                            ConflictNamer::copy_path(path, |c| diff.comparisons.contains_key(c));
                        Self::upload(plan, &copy_path, comparison.local_size);
                        Self::download(plan, path, comparison.remote_size);
                        plan.conflict_copies.push(ConflictCopy {
                            path: path.to_string(),
                            copy_path,
                        });
                    }
                }
                plan.resolved.push(applied);
            }
            Err(e) => {
                if e.is_unresolved() {
                    debug!(path = %comparison.path, reason = %e, "Conflict left for the caller");
                } else {
                    warn!(path = %comparison.path, error = %e, "Conflict resolution failed");
                }
                plan.conflicts.push(conflict);
            }
        }
    }

    fn plan_difference(&self, c: &FileComparison, plan: &mut SyncPlan) {
        let path = c.path.as_str();
        let orphans = self.config.delete_orphans;

        match self.config.direction {
            SyncDirection::Bidirectional => {
                if c.exists_local {
                    Self::upload(plan, path, c.local_size);
                } else if c.exists_remote {
                    Self::download(plan, path, c.remote_size);
                }
            }
            SyncDirection::LocalToRemote | SyncDirection::MirrorLocal => {
                if c.exists_local {
                    Self::upload(plan, path, c.local_size);
                } else if c.exists_remote
                    && (orphans || self.config.direction == SyncDirection::MirrorLocal)
                {
                    plan.files_to_delete.push(PathAction::remote(path));
                }
            }
            SyncDirection::RemoteToLocal | SyncDirection::MirrorRemote => {
                if c.exists_remote {
                    Self::download(plan, path, c.remote_size);
                } else if c.exists_local
                    && (orphans || self.config.direction == SyncDirection::MirrorRemote)
                {
                    plan.files_to_delete.push(PathAction::local(path));
                }
            }
        }
    }

    fn plan_folders(&self, diff: &TreeDiff, plan: &mut SyncPlan) {
        let direction = self.config.direction;
        let empty_folders = self.config.sync_empty_folders;

        // Ancestors of every transfer target must exist on the receiving side.
        let ancestors = |paths: &[String], existing: &BTreeSet<String>| -> BTreeSet<String> {
            let mut out = BTreeSet::new();
            for path in paths {
                let mut current = parent_of(path);
                while let Some(dir) = current {
                    if !existing.contains(dir) {
                        out.insert(dir.to_string());
                    }
                    current = parent_of(dir);
                }
            }
            out
        };

        if direction.uploads() {
            let mut create = ancestors(&plan.files_to_upload, &diff.remote_dirs);
            if empty_folders {
                create.extend(diff.dirs_missing_remotely().into_iter().map(str::to_string));
            }
            plan.folders_to_create
                .extend(create.into_iter().map(|d| PathAction::new(d, Side::Remote)));
        }
        if direction.downloads() {
            let mut create = ancestors(&plan.files_to_download, &diff.local_dirs);
            if empty_folders {
                create.extend(diff.dirs_missing_locally().into_iter().map(str::to_string));
            }
            plan.folders_to_create
                .extend(create.into_iter().map(|d| PathAction::new(d, Side::Local)));
        }

        let stale: Vec<PathAction> = match direction {
            SyncDirection::MirrorLocal => diff
                .dirs_missing_locally()
                .into_iter()
                .map(PathAction::remote)
                .collect(),
            SyncDirection::MirrorRemote => diff
                .dirs_missing_remotely()
                .into_iter()
                .map(PathAction::local)
                .collect(),
            _ => Vec::new(),
        };
        plan.folders_to_delete.extend(stale);
        plan.folders_to_delete
            .sort_by(|a, b| depth(&b.path).cmp(&depth(&a.path)).then(a.path.cmp(&b.path)));
    }
}

fn depth(path: &str) -> usize {
    path.matches('/').count()
}
