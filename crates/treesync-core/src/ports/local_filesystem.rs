//! Local filesystem port (driven/secondary port)
//!
//! Interface the engine uses to read and modify the local tree.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because filesystem errors are adapter-specific.
//! - Enumeration returns paths relative to the enumerated root with `/`
//!   separators, so they can be matched directly against remote paths.
//! - `copy` and `remove` are recursive for directories; backups rely on it.

use std::path::Path;

use chrono::{DateTime, Utc};

// ============================================================================
// LocalEntry
// ============================================================================

/// One entry produced by [`ILocalFileSystem::enumerate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    /// Path relative to the enumerated root, `/`-separated
    pub relative_path: String,
    pub is_dir: bool,
    /// Size in bytes (0 for directories)
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

// ============================================================================
// FileSystemState
// ============================================================================

/// Snapshot of a single path's state on the local filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSystemState {
    /// Whether the file/directory exists on disk
    pub exists: bool,
    /// Whether this is a regular file (false for directories and other types)
    pub is_file: bool,
    /// Size in bytes (0 for directories or non-existent files)
    pub size: u64,
    /// Last modification time (None if not available or file doesn't exist)
    pub modified: Option<DateTime<Utc>>,
}

impl FileSystemState {
    /// Returns a state representing a non-existent path
    pub fn not_found() -> Self {
        Self {
            exists: false,
            is_file: false,
            size: 0,
            modified: None,
        }
    }

    /// Returns true if the file exists and is a regular file
    pub fn is_regular_file(&self) -> bool {
        self.exists && self.is_file
    }

    /// Returns true if the file exists and is a directory
    pub fn is_directory(&self) -> bool {
        self.exists && !self.is_file
    }
}

// ============================================================================
// ILocalFileSystem trait
// ============================================================================

/// Port trait for local filesystem operations
#[async_trait::async_trait]
pub trait ILocalFileSystem: Send + Sync {
    /// Lists entries under `root`
    ///
    /// With `recursive` false only the immediate children are returned.
    /// `root` itself is never part of the result.
    ///
    /// # Errors
    /// Returns an error if `root` does not exist or cannot be read
    async fn enumerate(
        &self,
        root: &Path,
        recursive: bool,
        follow_symlinks: bool,
    ) -> anyhow::Result<Vec<LocalEntry>>;

    /// Gets the current state of a file or directory
    ///
    /// Returns `FileSystemState::not_found()` if the path doesn't exist
    /// (does not return an error for missing paths).
    async fn get_state(&self, path: &Path) -> anyhow::Result<FileSystemState>;

    /// Hex-encoded SHA-256 of the file contents
    async fn compute_checksum(&self, path: &Path) -> anyhow::Result<String>;

    /// Copies a file, or a directory recursively; returns bytes copied
    async fn copy(&self, from: &Path, to: &Path) -> anyhow::Result<u64>;

    /// Renames a file or directory
    async fn rename(&self, from: &Path, to: &Path) -> anyhow::Result<()>;

    /// Removes a file, or a directory recursively
    async fn remove(&self, path: &Path) -> anyhow::Result<()>;

    /// Creates a directory and all parent directories as needed
    async fn create_directories(&self, path: &Path) -> anyhow::Result<()>;

    /// Last modification time of `path`
    async fn last_write_time(&self, path: &Path) -> anyhow::Result<Option<DateTime<Utc>>>;

    /// Sets the modification time of `path`
    async fn set_last_write_time(&self, path: &Path, time: DateTime<Utc>) -> anyhow::Result<()>;
}
