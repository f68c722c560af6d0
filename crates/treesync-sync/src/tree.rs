//! Local and remote tree readers
//!
//! Both readers flatten a tree into a [`TreeSnapshot`] keyed by the path
//! relative to the sync root, `/`-separated. Directories pruned by the
//! filter are not descended into; every other filter rule is applied later
//! by the diff engine, once both sides are known.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use treesync_core::domain::{FilterCandidate, SideMetadata, SyncConfig};
use treesync_core::ports::{ILocalFileSystem, IRemoteStore};

use crate::filter::FilterEngine;
use crate::{Result, SyncError};

/// Local location of a relative path under `root`
pub fn local_path_of(root: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|s| !s.is_empty())
        .fold(root.to_path_buf(), |acc, part| acc.join(part))
}

/// Remote location of a relative path under `root`
pub fn remote_path_of(root: &str, relative: &str) -> String {
    let base = root.trim_end_matches('/');
    if relative.is_empty() {
        if base.is_empty() {
            "/".to_string()
        } else {
            base.to_string()
        }
    } else {
        format!("{base}/{relative}")
    }
}

/// Parent of a relative path, `None` at the root
pub fn parent_of(relative: &str) -> Option<&str> {
    relative.rsplit_once('/').map(|(parent, _)| parent)
}

/// Flattened view of one side
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeSnapshot {
    /// Files by relative path
    pub files: BTreeMap<String, SideMetadata>,
    /// Directory relative paths
    pub dirs: Vec<String>,
}

impl TreeSnapshot {
    fn is_pruned(pruned: &[String], path: &str) -> bool {
        pruned.iter().any(|p| {
            path.len() > p.len()
                && path.starts_with(p.as_str())
                && path.as_bytes()[p.len()] == b'/'
        })
    }
}

// ============================================================================
// Local Tree Reader
// ============================================================================

/// Reads the local side through [`ILocalFileSystem`]
pub struct LocalTreeReader<'a> {
    fs: &'a dyn ILocalFileSystem,
}

impl<'a> LocalTreeReader<'a> {
    pub fn new(fs: &'a dyn ILocalFileSystem) -> Self {
        Self { fs }
    }

    /// Enumerates the profile's local root
    ///
    /// # Errors
    /// [`SyncError::Configuration`] if the local root is missing.
    #[instrument(skip(self, config, filter), fields(root = %config.local_path.display()))]
    pub async fn read(&self, config: &SyncConfig, filter: &FilterEngine) -> Result<TreeSnapshot> {
        let root = &config.local_path;
        if !self.fs.get_state(root).await?.is_directory() {
            return Err(SyncError::Configuration(format!(
                "Local path does not exist: {}",
                root.display()
            )));
        }

        let mut entries = self
            .fs
            .enumerate(root, config.recursive, config.filter.follow_symlinks)
            .await?;
        entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        let mut snapshot = TreeSnapshot::default();
        let mut pruned: Vec<String> = Vec::new();
        for entry in entries {
            if TreeSnapshot::is_pruned(&pruned, &entry.relative_path) {
                continue;
            }
            if entry.is_dir {
                if filter.prunes(&FilterCandidate::dir(entry.relative_path.as_str())) {
                    pruned.push(entry.relative_path);
                } else {
                    snapshot.dirs.push(entry.relative_path);
                }
            } else {
                snapshot.files.insert(
                    entry.relative_path,
                    SideMetadata {
                        size: entry.size,
                        modified: entry.modified,
                        checksum: None,
                    },
                );
            }
        }

        debug!(
            files = snapshot.files.len(),
            dirs = snapshot.dirs.len(),
            pruned = pruned.len(),
            "local tree read"
        );
        Ok(snapshot)
    }
}

// ============================================================================
// Remote Tree Reader
// ============================================================================

/// Reads the remote side through [`IRemoteStore`]
pub struct RemoteTreeReader<'a> {
    store: &'a dyn IRemoteStore,
}

impl<'a> RemoteTreeReader<'a> {
    pub fn new(store: &'a dyn IRemoteStore) -> Self {
        Self { store }
    }

    /// Walks the profile's remote root
    ///
    /// # Errors
    /// [`SyncError::Connectivity`] if the root cannot be resolved or any
    /// listing fails.
    #[instrument(skip(self, config, filter), fields(root = %config.remote_path))]
    pub async fn read(&self, config: &SyncConfig, filter: &FilterEngine) -> Result<TreeSnapshot> {
        let root = self
            .store
            .resolve(&config.remote_path)
            .await
            .map_err(|e| SyncError::Connectivity(format!("{e:#}")))?
            .ok_or_else(|| {
                SyncError::Connectivity(format!(
                    "Remote path does not exist: {}",
                    config.remote_path
                ))
            })?;

        let mut snapshot = TreeSnapshot::default();
        let mut pending = vec![(root, String::new())];
        while let Some((handle, prefix)) = pending.pop() {
            let children = self
                .store
                .list_children(&handle)
                .await
                .map_err(|e| SyncError::Connectivity(format!("{e:#}")))?;

            for child in children {
                let relative = if prefix.is_empty() {
                    child.name.clone()
                } else {
                    format!("{prefix}/{}", child.name)
                };

                if child.is_folder {
                    if filter.prunes(&FilterCandidate::dir(relative.as_str())) {
                        continue;
                    }
                    snapshot.dirs.push(relative.clone());
                    if config.recursive {
                        pending.push((child.handle, relative));
                    }
                } else {
                    snapshot.files.insert(
                        relative,
                        SideMetadata {
                            size: child.size,
                            modified: child.modified,
                            checksum: child.checksum.filter(|c| !c.is_empty()),
                        },
                    );
                }
            }
        }

        snapshot.dirs.sort();
        debug!(
            files = snapshot.files.len(),
            dirs = snapshot.dirs.len(),
            "remote tree read"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use treesync_core::domain::{SyncDirection, SyncFilter};

    use super::*;
    use crate::directory_store::DirectoryRemoteStore;
    use crate::filesystem::LocalFileSystemAdapter;

    fn populate(root: &Path, files: &[&str]) {
        for f in files {
            let p = root.join(f);
            std::fs::create_dir_all(p.parent().unwrap()).unwrap();
            std::fs::write(p, f.as_bytes()).unwrap();
        }
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(remote_path_of("/docs/", "a/b.txt"), "/docs/a/b.txt");
        assert_eq!(remote_path_of("/", "b.txt"), "/b.txt");
        assert_eq!(remote_path_of("/", ""), "/");
        assert_eq!(parent_of("a/b/c.txt"), Some("a/b"));
        assert_eq!(parent_of("c.txt"), None);
        assert_eq!(
            local_path_of(Path::new("/tmp/root"), "a/b.txt"),
            PathBuf::from("/tmp/root/a/b.txt")
        );
    }

    #[tokio::test]
    async fn test_both_readers_agree_and_prune_hidden_dirs() {
        let local = TempDir::new().unwrap();
        let remote = TempDir::new().unwrap();
        let files = ["a.txt", "sub/b.txt", ".git/config", "sub/.cache/c.txt"];
        populate(local.path(), &files);
        populate(remote.path(), &files);

        let mut config = SyncConfig::new("t", local.path(), "/", SyncDirection::Bidirectional);
        config.filter = SyncFilter {
            exclude_hidden: true,
            ..SyncFilter::default()
        };
        let filter = FilterEngine::new(&config.filter);

        let fs = LocalFileSystemAdapter::new();
        let store = DirectoryRemoteStore::new(remote.path());
        let l = LocalTreeReader::new(&fs).read(&config, &filter).await.unwrap();
        let r = RemoteTreeReader::new(&store).read(&config, &filter).await.unwrap();

        let keys: Vec<_> = l.files.keys().cloned().collect();
        assert_eq!(keys, vec!["a.txt", "sub/b.txt"]);
        assert_eq!(l.dirs, vec!["sub"]);
        assert_eq!(l.files.keys().collect::<Vec<_>>(), r.files.keys().collect::<Vec<_>>());
        assert_eq!(l.dirs, r.dirs);
        assert_eq!(r.files["a.txt"].size, 5);
    }

    #[tokio::test]
    async fn test_non_recursive_reads_top_level_only() {
        let local = TempDir::new().unwrap();
        let remote = TempDir::new().unwrap();
        populate(remote.path(), &["a.txt", "sub/b.txt"]);

        let mut config = SyncConfig::new("t", local.path(), "/", SyncDirection::Bidirectional);
        config.recursive = false;
        let filter = FilterEngine::new(&config.filter);
        let store = DirectoryRemoteStore::new(remote.path());
        let r = RemoteTreeReader::new(&store).read(&config, &filter).await.unwrap();
        assert_eq!(r.files.len(), 1);
        assert_eq!(r.dirs, vec!["sub"]);
    }

    #[tokio::test]
    async fn test_missing_roots_map_to_error_kinds() {
        let local = TempDir::new().unwrap();
        let remote = TempDir::new().unwrap();
        let fs = LocalFileSystemAdapter::new();
        let store = DirectoryRemoteStore::new(remote.path());

        let config = SyncConfig::new(
            "t",
            local.path().join("missing"),
            "/nowhere",
            SyncDirection::Bidirectional,
        );
        let filter = FilterEngine::new(&config.filter);

        let err = LocalTreeReader::new(&fs).read(&config, &filter).await.unwrap_err();
        assert!(matches!(err, SyncError::Configuration(_)));
        let err = RemoteTreeReader::new(&store).read(&config, &filter).await.unwrap_err();
        assert!(matches!(err, SyncError::Connectivity(ref m) if m.contains("/nowhere")));
    }
}
