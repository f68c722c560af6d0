//! Callback ports
//!
//! Synchronous hooks the embedding application registers on the sync
//! service. They are invoked from worker tasks and must not block for long.

use std::sync::Arc;

use crate::domain::{ConflictResolution, SyncConflict, SyncId, SyncProgress};

/// Decides a conflict; used for both the interactive (`ask_user`) and the
/// programmatic (`custom`) slot
///
/// Returning a delegated policy (`ask_user` / `custom`) leaves the conflict
/// unresolved.
pub type ConflictDecider = Arc<dyn Fn(&SyncConflict) -> ConflictResolution + Send + Sync>;

/// Invoked after every completed action
pub type ProgressCallback = Arc<dyn Fn(&SyncProgress) + Send + Sync>;

/// Invoked for every per-file or run-level error
pub type ErrorCallback = Arc<dyn Fn(&SyncId, &str) + Send + Sync>;
