//! Shared fixtures for the end-to-end tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use treesync_core::domain::{SyncConfig, SyncDirection};
use treesync_sync::{DirectoryRemoteStore, LocalFileSystemAdapter, SyncManager, SyncManagerOptions};

/// A local tree, a remote tree and a manager over both
pub struct Fixture {
    pub tmp: TempDir,
    pub manager: Arc<SyncManager>,
}

impl Fixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("local")).unwrap();
        std::fs::create_dir_all(tmp.path().join("remote")).unwrap();
        let manager = Arc::new(SyncManager::new(
            Arc::new(LocalFileSystemAdapter::new()),
            Arc::new(DirectoryRemoteStore::new(tmp.path().join("remote"))),
            SyncManagerOptions {
                backup_directory: Some(tmp.path().join("backups")),
                retry_base_delay: Duration::from_millis(1),
                ..SyncManagerOptions::default()
            },
        ));
        Self { tmp, manager }
    }

    pub fn local(&self) -> PathBuf {
        self.tmp.path().join("local")
    }

    pub fn remote(&self) -> PathBuf {
        self.tmp.path().join("remote")
    }

    pub fn config(&self, direction: SyncDirection) -> SyncConfig {
        SyncConfig::new("fixture", self.local(), "/", direction)
    }
}

/// Writes `content` to `root/rel`, creating parents
pub fn write(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

/// Gives `root/rel` a fixed modification time
pub fn set_mtime(root: &Path, rel: &str, unix_secs: i64) {
    filetime::set_file_mtime(
        root.join(rel),
        filetime::FileTime::from_unix_time(unix_secs, 0),
    )
    .unwrap();
}
