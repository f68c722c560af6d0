//! Diff engine
//!
//! Merges the local and remote snapshots into one [`FileComparison`] per
//! relative path, applying the filter with the metadata of whichever side
//! has the file (local first). Directories seen on each side are kept so
//! the planner can create and delete folders.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{info, instrument, warn};

use treesync_core::domain::{FileComparison, FilterCandidate, SideMetadata, SyncConfig};
use treesync_core::ports::{ILocalFileSystem, IRemoteStore};

use crate::filter::FilterEngine;
use crate::tree::{local_path_of, LocalTreeReader, RemoteTreeReader, TreeSnapshot};
use crate::Result;

/// Result of comparing two trees
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeDiff {
    /// One comparison per file path, ordered by path
    pub comparisons: BTreeMap<String, FileComparison>,
    /// Included directories present locally
    pub local_dirs: BTreeSet<String>,
    /// Included directories present remotely
    pub remote_dirs: BTreeSet<String>,
    /// Whether paths were matched case-insensitively
    pub case_insensitive: bool,
}

impl TreeDiff {
    fn fold(&self, path: &str) -> String {
        if self.case_insensitive {
            path.to_lowercase()
        } else {
            path.to_string()
        }
    }

    fn contains_dir(&self, dirs: &BTreeSet<String>, path: &str) -> bool {
        if !self.case_insensitive {
            return dirs.contains(path);
        }
        let key = self.fold(path);
        dirs.iter().any(|d| self.fold(d) == key)
    }

    /// Local directories with no remote counterpart
    pub fn dirs_missing_remotely(&self) -> Vec<&str> {
        self.local_dirs
            .iter()
            .filter(|d| !self.contains_dir(&self.remote_dirs, d))
            .map(String::as_str)
            .collect()
    }

    /// Remote directories with no local counterpart
    pub fn dirs_missing_locally(&self) -> Vec<&str> {
        self.remote_dirs
            .iter()
            .filter(|d| !self.contains_dir(&self.local_dirs, d))
            .map(String::as_str)
            .collect()
    }

    /// Comparisons whose sides differ
    pub fn differences(&self) -> impl Iterator<Item = &FileComparison> {
        self.comparisons.values().filter(|c| c.is_different)
    }

    pub fn get(&self, path: &str) -> Option<&FileComparison> {
        self.comparisons.get(path)
    }

    /// Number of differing paths
    pub fn difference_count(&self) -> usize {
        self.differences().count()
    }
}

/// Computes [`TreeDiff`]s through the two ports
#[derive(Clone)]
pub struct DiffEngine {
    fs: Arc<dyn ILocalFileSystem>,
    store: Arc<dyn IRemoteStore>,
}

impl DiffEngine {
    pub fn new(fs: Arc<dyn ILocalFileSystem>, store: Arc<dyn IRemoteStore>) -> Self {
        Self { fs, store }
    }

    /// Reads both trees for `config` and compares them
    ///
    /// # Errors
    /// A missing local root is a configuration error; an unreachable remote
    /// root is a connectivity error. No partial diff is returned.
    #[instrument(skip(self, config), fields(profile = %config.name))]
    pub async fn calculate(&self, config: &SyncConfig) -> Result<TreeDiff> {
        let filter = FilterEngine::new(&config.filter);
        let local = LocalTreeReader::new(self.fs.as_ref())
            .read(config, &filter)
            .await?;
        let remote = RemoteTreeReader::new(self.store.as_ref())
            .read(config, &filter)
            .await?;

        let mut diff = Self::merge(local, remote, &filter, config.case_insensitive);

        if config.verify_transfers {
            self.attach_local_checksums(config, &mut diff).await;
        }

        info!(
            files = diff.comparisons.len(),
            differences = diff.difference_count(),
            local_dirs = diff.local_dirs.len(),
            remote_dirs = diff.remote_dirs.len(),
            "Diff calculated"
        );
        Ok(diff)
    }

    /// Pure merge of two snapshots
    pub fn merge(
        local: TreeSnapshot,
        remote: TreeSnapshot,
        filter: &FilterEngine,
        case_insensitive: bool,
    ) -> TreeDiff {
        let fold = |p: &str| {
            if case_insensitive {
                p.to_lowercase()
            } else {
                p.to_string()
            }
        };

        // key -> (display path, local, remote)
        let mut merged: BTreeMap<String, (String, Option<SideMetadata>, Option<SideMetadata>)> =
            BTreeMap::new();
        for (path, meta) in local.files {
            merged.insert(fold(&path), (path, Some(meta), None));
        }
        for (path, meta) in remote.files {
            match merged.entry(fold(&path)) {
                Entry::Occupied(mut slot) => slot.get_mut().2 = Some(meta),
                Entry::Vacant(slot) => {
                    slot.insert((path, None, Some(meta)));
                }
            }
        }

        let mut comparisons = BTreeMap::new();
        for (path, l, r) in merged.into_values() {
            let Some(present) = l.as_ref().or(r.as_ref()) else {
                continue;
            };
            let candidate = FilterCandidate::file(path.as_str(), present.size, present.modified);
            if !filter.should_include(&candidate) {
                continue;
            }
            let comparison = FileComparison::compute(path.as_str(), l.as_ref(), r.as_ref());
            comparisons.insert(path, comparison);
        }

        let keep_dir = |d: &String| filter.should_include(&FilterCandidate::dir(d.as_str()));
        TreeDiff {
            comparisons,
            local_dirs: local.dirs.into_iter().filter(keep_dir).collect(),
            remote_dirs: remote.dirs.into_iter().filter(keep_dir).collect(),
            case_insensitive,
        }
    }

    /// Fills in the local SHA-256 of every included local file
    ///
    /// A file that cannot be hashed keeps an empty checksum and is compared
    /// on size and time only.
    async fn attach_local_checksums(&self, config: &SyncConfig, diff: &mut TreeDiff) {
        for comparison in diff.comparisons.values_mut() {
            if !comparison.exists_local {
                continue;
            }
            let path = local_path_of(&config.local_path, &comparison.path);
            match self.fs.compute_checksum(&path).await {
                Ok(checksum) => {
                    let local = SideMetadata {
                        size: comparison.local_size,
                        modified: comparison.local_modified,
                        checksum: Some(checksum),
                    };
                    let remote = comparison.exists_remote.then(|| SideMetadata {
                        size: comparison.remote_size,
                        modified: comparison.remote_modified,
                        checksum: comparison.remote_checksum.clone(),
                    });
                    *comparison = FileComparison::compute(
                        comparison.path.clone(),
                        Some(&local),
                        remote.as_ref(),
                    );
                }
                Err(e) => {
                    warn!(path = %comparison.path, error = %e, "Failed to hash local file");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use treesync_core::domain::{DifferenceReason, SyncFilter};

    use super::*;

    fn meta(size: u64, secs: i64) -> SideMetadata {
        SideMetadata {
            size,
            modified: Some(Utc.timestamp_opt(secs, 0).unwrap()),
            checksum: None,
        }
    }

    fn snapshot(files: &[(&str, u64, i64)], dirs: &[&str]) -> TreeSnapshot {
        TreeSnapshot {
            files: files
                .iter()
                .map(|(p, s, t)| (p.to_string(), meta(*s, *t)))
                .collect(),
            dirs: dirs.iter().map(|d| d.to_string()).collect(),
        }
    }

    #[test]
    fn test_merge_classifies_every_path() {
        let local = snapshot(
            &[("same.txt", 1, 10), ("changed.txt", 1, 10), ("l.txt", 1, 10)],
            &["a"],
        );
        let remote = snapshot(
            &[("same.txt", 1, 10), ("changed.txt", 2, 10), ("r.txt", 1, 10)],
            &["b"],
        );
        let filter = FilterEngine::new(&SyncFilter::default());

        let diff = DiffEngine::merge(local, remote, &filter, false);
        assert_eq!(diff.comparisons.len(), 4);
        assert!(!diff.get("same.txt").unwrap().is_different);
        assert_eq!(
            diff.get("changed.txt").unwrap().difference_reason,
            Some(DifferenceReason::SizeMismatch)
        );
        assert!(diff.get("l.txt").unwrap().exists_local);
        assert!(!diff.get("r.txt").unwrap().exists_local);
        assert_eq!(diff.difference_count(), 3);
        assert_eq!(diff.dirs_missing_remotely(), vec!["a"]);
        assert_eq!(diff.dirs_missing_locally(), vec!["b"]);
    }

    #[test]
    fn test_filter_uses_local_metadata_first() {
        let filter = FilterEngine::new(&SyncFilter {
            max_file_size: 5,
            ..SyncFilter::default()
        });
        let local = snapshot(&[("big.bin", 100, 10)], &[]);
        let remote = snapshot(&[("big.bin", 1, 10), ("small.bin", 1, 10)], &[]);

        let diff = DiffEngine::merge(local, remote, &filter, false);
        assert!(diff.get("big.bin").is_none());
        assert!(diff.get("small.bin").is_some());
    }

    #[test]
    fn test_case_insensitive_matching() {
        let filter = FilterEngine::new(&SyncFilter::default());
        let local = snapshot(&[("Docs/A.txt", 1, 10)], &["Docs"]);
        let remote = snapshot(&[("docs/a.txt", 1, 10)], &["docs"]);

        let diff = DiffEngine::merge(local.clone(), remote.clone(), &filter, true);
        assert_eq!(diff.comparisons.len(), 1);
        assert!(!diff.get("Docs/A.txt").unwrap().is_different);
        assert!(diff.dirs_missing_remotely().is_empty());

        let diff = DiffEngine::merge(local, remote, &filter, false);
        assert_eq!(diff.comparisons.len(), 2);
    }
}
