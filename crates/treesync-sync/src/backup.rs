//! Backup snapshots
//!
//! A backup is a recursive copy of a local path taken before a run that
//! overwrites or deletes local files. Copies land next to the original
//! (`<name>.backup_<id>`) unless a backup directory is configured.
//!
//! Retention is not automatic: [`BackupManager::cleanup_old_backups`] prunes
//! the oldest copies of a path when asked to, and the executor calls it after
//! each backup it takes. Backups made by another process are never seen.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use treesync_core::domain::{BackupId, BackupInfo};
use treesync_core::ports::ILocalFileSystem;

use crate::{Result, SyncError};

/// Creates, restores and prunes backups through [`ILocalFileSystem`]
pub struct BackupManager {
    fs: Arc<dyn ILocalFileSystem>,
    directory: Option<PathBuf>,
    /// Ceiling applied to every cleanup
    max_versions: u32,
    /// Registry in creation order
    backups: RwLock<Vec<BackupInfo>>,
}

impl BackupManager {
    /// `directory` overrides the default sibling location
    pub fn new(fs: Arc<dyn ILocalFileSystem>, directory: Option<PathBuf>) -> Self {
        Self {
            fs,
            directory,
            max_versions: u32::MAX,
            backups: RwLock::new(Vec::new()),
        }
    }

    /// Caps how many versions of a path any cleanup keeps
    pub fn with_max_versions(mut self, max_versions: u32) -> Self {
        self.max_versions = max_versions;
        self
    }

    fn backup_path_for(&self, original: &Path, id: &BackupId) -> Result<PathBuf> {
        let name = original
            .file_name()
            .ok_or_else(|| SyncError::Backup(format!("Cannot back up {}", original.display())))?;
        let mut file_name = name.to_os_string();
        file_name.push(format!(".{id}"));

        let dir = match (&self.directory, original.parent()) {
            (Some(dir), _) => dir.clone(),
            (None, Some(parent)) => parent.to_path_buf(),
            (None, None) => {
                return Err(SyncError::Backup(format!(
                    "Cannot back up {}",
                    original.display()
                )))
            }
        };
        Ok(dir.join(file_name))
    }

    /// Copies `path` recursively and records the snapshot
    ///
    /// # Errors
    /// [`SyncError::Backup`] if the path is missing or the copy fails.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn create_backup(&self, path: &Path) -> Result<BackupInfo> {
        let state = self
            .fs
            .get_state(path)
            .await
            .map_err(|e| SyncError::Backup(format!("{e:#}")))?;
        if !state.exists {
            return Err(SyncError::Backup(format!(
                "Path does not exist: {}",
                path.display()
            )));
        }

        let backup_id = BackupId::new();
        let backup_path = self.backup_path_for(path, &backup_id)?;
        if let Some(parent) = backup_path.parent() {
            self.fs
                .create_directories(parent)
                .await
                .map_err(|e| SyncError::Backup(format!("{e:#}")))?;
        }
        let bytes = self
            .fs
            .copy(path, &backup_path)
            .await
            .map_err(|e| SyncError::Backup(format!("{e:#}")))?;

        let info = BackupInfo {
            backup_id,
            original_path: path.to_path_buf(),
            backup_path,
            timestamp: Utc::now(),
        };
        info!(
            backup_id = %info.backup_id,
            backup_path = %info.backup_path.display(),
            bytes,
            "Backup created"
        );
        self.backups.write().await.push(info.clone());
        Ok(info)
    }

    /// Replaces the original path with the contents of backup `id`
    ///
    /// The backup itself is kept.
    #[instrument(skip(self))]
    pub async fn restore_backup(&self, id: &BackupId) -> Result<()> {
        let info = self
            .backups
            .read()
            .await
            .iter()
            .find(|b| b.backup_id == *id)
            .cloned()
            .ok_or_else(|| SyncError::Backup(format!("Unknown backup: {id}")))?;

        let state = self
            .fs
            .get_state(&info.backup_path)
            .await
            .map_err(|e| SyncError::Backup(format!("{e:#}")))?;
        if !state.exists {
            return Err(SyncError::Backup(format!(
                "Backup contents missing: {}",
                info.backup_path.display()
            )));
        }

        self.fs
            .remove(&info.original_path)
            .await
            .map_err(|e| SyncError::Backup(format!("{e:#}")))?;
        self.fs
            .copy(&info.backup_path, &info.original_path)
            .await
            .map_err(|e| SyncError::Backup(format!("{e:#}")))?;

        info!(
            backup_id = %id,
            original_path = %info.original_path.display(),
            "Backup restored"
        );
        Ok(())
    }

    /// All recorded backups, oldest first
    pub async fn list_backups(&self) -> Vec<BackupInfo> {
        self.backups.read().await.clone()
    }

    /// Deletes the oldest backups of `path` beyond `max_versions` (or the
    /// configured ceiling, if lower)
    ///
    /// Returns how many were removed. A copy that cannot be deleted is
    /// logged and stays registered.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn cleanup_old_backups(&self, path: &Path, max_versions: u32) -> usize {
        let max_versions = max_versions.min(self.max_versions);
        let stale: Vec<BackupInfo> = {
            let backups = self.backups.read().await;
            let mut of_path: Vec<&BackupInfo> =
                backups.iter().filter(|b| b.original_path == path).collect();
            of_path.sort_by_key(|b| b.timestamp);
            let excess = of_path.len().saturating_sub(max_versions as usize);
            of_path.into_iter().take(excess).cloned().collect()
        };

        let mut removed = Vec::new();
        for backup in stale {
            match self.fs.remove(&backup.backup_path).await {
                Ok(()) => removed.push(backup.backup_id),
                Err(e) => warn!(
                    backup_id = %backup.backup_id,
                    error = %e,
                    "Failed to delete old backup"
                ),
            }
        }

        if !removed.is_empty() {
            self.backups
                .write()
                .await
                .retain(|b| !removed.contains(&b.backup_id));
            info!(removed = removed.len(), max_versions, "Old backups pruned");
        }
        removed.len()
    }
}
