//! Local filesystem adapter (secondary/driven adapter)
//!
//! Implements [`ILocalFileSystem`] using `tokio::fs` for single-path
//! operations and `walkdir` on a blocking thread for tree traversal.
//!
//! ## Design Decisions
//!
//! - **Relative paths**: enumeration strips the root and joins components
//!   with `/` so keys line up with remote paths on every platform.
//! - **SHA-256**: content checksums are the hex digest, streamed in chunks.
//! - **Idempotent removal**: removing a missing path succeeds.
//! - **Timestamps**: recursive copies carry modification times over with
//!   `filetime`, so restored backups compare equal to what was saved.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::Context;
use chrono::{DateTime, Utc};
use filetime::FileTime;
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument};
use walkdir::WalkDir;

use treesync_core::ports::local_filesystem::{FileSystemState, ILocalFileSystem, LocalEntry};

/// Read buffer used when hashing
const HASH_BUFFER_SIZE: usize = 64 * 1024;

// ============================================================================
// LocalFileSystemAdapter struct
// ============================================================================

/// Adapter that bridges the [`ILocalFileSystem`] port to the real filesystem.
///
/// This is a zero-sized struct because all operations derive their context
/// from the path arguments.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystemAdapter;

impl LocalFileSystemAdapter {
    /// Create a new `LocalFileSystemAdapter`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

/// `/`-joined path of `path` relative to `root`
fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

fn walk(root: &Path, recursive: bool, follow_symlinks: bool) -> anyhow::Result<Vec<LocalEntry>> {
    if !root.is_dir() {
        anyhow::bail!("Local path does not exist: {}", root.display());
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut entries = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(follow_symlinks)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        let file_type = entry.file_type();
        if !file_type.is_file() && !file_type.is_dir() {
            continue;
        }
        let Some(relative_path) = relative_key(root, entry.path()) else {
            continue;
        };
        let metadata = entry
            .metadata()
            .with_context(|| format!("Failed to stat {}", entry.path().display()))?;

        entries.push(LocalEntry {
            relative_path,
            is_dir: file_type.is_dir(),
            size: if file_type.is_dir() { 0 } else { metadata.len() },
            modified: metadata.modified().ok().map(to_utc),
        });
    }
    Ok(entries)
}

fn copy_tree(from: &Path, to: &Path) -> anyhow::Result<u64> {
    let metadata = std::fs::metadata(from)
        .with_context(|| format!("Failed to stat {}", from.display()))?;

    if !metadata.is_dir() {
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = std::fs::copy(from, to)?;
        filetime::set_file_mtime(to, FileTime::from_last_modification_time(&metadata))?;
        return Ok(bytes);
    }

    let mut bytes = 0;
    std::fs::create_dir_all(to)?;
    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry?;
        let target: PathBuf = to.join(entry.path().strip_prefix(from)?);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            bytes += std::fs::copy(entry.path(), &target)?;
            let meta = entry.metadata()?;
            filetime::set_file_mtime(&target, FileTime::from_last_modification_time(&meta))?;
        }
    }
    Ok(bytes)
}

// ============================================================================
// ILocalFileSystem implementation
// ============================================================================

#[async_trait::async_trait]
impl ILocalFileSystem for LocalFileSystemAdapter {
    #[instrument(skip(self), fields(root = %root.display()))]
    async fn enumerate(
        &self,
        root: &Path,
        recursive: bool,
        follow_symlinks: bool,
    ) -> anyhow::Result<Vec<LocalEntry>> {
        let root_owned = root.to_path_buf();
        let entries =
            tokio::task::spawn_blocking(move || walk(&root_owned, recursive, follow_symlinks))
                .await??;
        debug!(count = entries.len(), "enumeration complete");
        Ok(entries)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn get_state(&self, path: &Path) -> anyhow::Result<FileSystemState> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("path not found");
                return Ok(FileSystemState::not_found());
            }
            Err(e) => return Err(e.into()),
        };

        let is_file = metadata.is_file();
        Ok(FileSystemState {
            exists: true,
            is_file,
            size: if is_file { metadata.len() } else { 0 },
            modified: metadata.modified().ok().map(to_utc),
        })
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn compute_checksum(&self, path: &Path) -> anyhow::Result<String> {
        let mut file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; HASH_BUFFER_SIZE];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        let checksum = format!("{:x}", hasher.finalize());
        debug!(checksum = %checksum, "checksum computed");
        Ok(checksum)
    }

    #[instrument(skip(self), fields(from = %from.display(), to = %to.display()))]
    async fn copy(&self, from: &Path, to: &Path) -> anyhow::Result<u64> {
        let (from, to) = (from.to_path_buf(), to.to_path_buf());
        let bytes = tokio::task::spawn_blocking(move || copy_tree(&from, &to)).await??;
        debug!(bytes, "copy complete");
        Ok(bytes)
    }

    #[instrument(skip(self), fields(from = %from.display(), to = %to.display()))]
    async fn rename(&self, from: &Path, to: &Path) -> anyhow::Result<()> {
        if let Some(parent) = to.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::rename(from, to)
            .await
            .with_context(|| format!("Failed to rename {}", from.display()))?;
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn remove(&self, path: &Path) -> anyhow::Result<()> {
        let metadata = match tokio::fs::symlink_metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("already absent");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if metadata.is_dir() {
            debug!("removing directory recursively");
            tokio::fs::remove_dir_all(path).await?;
        } else {
            debug!("removing file");
            tokio::fs::remove_file(path).await?;
        }
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn create_directories(&self, path: &Path) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(path).await?;
        Ok(())
    }

    async fn last_write_time(&self, path: &Path) -> anyhow::Result<Option<DateTime<Utc>>> {
        Ok(self.get_state(path).await?.modified)
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn set_last_write_time(&self, path: &Path, time: DateTime<Utc>) -> anyhow::Result<()> {
        let path = path.to_path_buf();
        let mtime = FileTime::from_unix_time(time.timestamp(), time.timestamp_subsec_nanos());
        tokio::task::spawn_blocking(move || filetime::set_file_mtime(&path, mtime)).await??;
        Ok(())
    }
}

// ============================================================================
// Unit tests
// ============================================================================
