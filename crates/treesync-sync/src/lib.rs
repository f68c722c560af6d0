//! TreeSync Sync - Differential synchronization engine
//!
//! Provides:
//! - Local and remote tree enumeration with include/exclude filtering
//! - Per-path comparison of the two trees
//! - Direction-aware plan building with conflict resolution
//! - Plan execution with pause/cancel, retries and live progress
//! - Profile, instance and report registries behind [`SyncManager`]
//! - Interval and one-shot scheduling, and pre-run backups
//!
//! ## Modules
//!
//! - [`filter`] - Filter engine deciding which paths take part in a sync
//! - [`tree`] - Local and remote tree readers
//! - [`diff`] - Diff engine merging both trees into comparisons
//! - [`planner`] - Plan builder turning comparisons into actions
//! - [`transfer`] - Per-handle transfer state tracking
//! - [`executor`] - Plan executor driving one sync instance
//! - [`manager`] - The sync service and its registries
//! - [`scheduler`] - Background loop starting due profiles
//! - [`backup`] - Backup snapshots and restore
//! - [`filesystem`] - Local filesystem adapter
//! - [`directory_store`] - Remote store adapter over a directory

pub mod backup;
pub mod diff;
pub mod directory_store;
pub mod executor;
pub mod filesystem;
pub mod filter;
pub mod instance;
pub mod manager;
pub mod planner;
pub mod retry;
pub mod scheduler;
pub mod transfer;
pub mod tree;

use thiserror::Error;

use treesync_conflict::ConflictError;
use treesync_core::domain::{DomainError, ProfileId, SyncId};

pub use backup::BackupManager;
pub use diff::{DiffEngine, TreeDiff};
pub use directory_store::DirectoryRemoteStore;
pub use filesystem::LocalFileSystemAdapter;
pub use filter::FilterEngine;
pub use manager::{SyncManager, SyncManagerOptions};
pub use planner::{PlanBuilder, PlanMode};
pub use scheduler::SyncScheduler;

/// Errors that can occur during synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid profile or paths missing at analysis time
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No profile is registered under this id
    #[error("Profile not found: {0}")]
    ProfileNotFound(ProfileId),

    /// No instance or report is registered under this id
    #[error("Sync not found: {0}")]
    SyncNotFound(SyncId),

    /// The remote root cannot be resolved or listed
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// A single upload, download or delete failed
    #[error("Transfer failed for {path}: {message}")]
    Transfer { path: String, message: String },

    /// A backup could not be created, restored or found
    #[error("Backup error: {0}")]
    Backup(String),

    /// An I/O error occurred during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A domain-level error propagated from treesync-core
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// A conflict rule or resolution error
    #[error("Conflict error: {0}")]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result alias used across the sync crate
pub type Result<T> = std::result::Result<T, SyncError>;
