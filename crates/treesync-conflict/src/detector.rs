//! Conflict detection logic
//!
//! Classifies every differing comparison and decides which of them are
//! genuine conflicts for the profile's direction. Only a bidirectional sync
//! with both sides present and different needs a resolution policy; every
//! other difference maps straight to a plan action.

use tracing::debug;

use treesync_core::domain::{
    ConflictResolution, ConflictType, FileComparison, SyncConflict, SyncDirection,
};

/// Description attached to `both_modified` conflicts
pub const BOTH_MODIFIED_DESCRIPTION: &str =
    "File has been modified in both local and remote locations";
/// Description attached to `local_only` classifications
pub const LOCAL_ONLY_DESCRIPTION: &str = "File exists only locally";
/// Description attached to `remote_only` classifications
pub const REMOTE_ONLY_DESCRIPTION: &str = "File exists only remotely";

/// Detects conflicts between the local and remote versions of a path
pub struct ConflictDetector;

impl ConflictDetector {
    /// Classifies a differing comparison
    ///
    /// Returns `None` for comparisons that do not differ.
    pub fn classify(comparison: &FileComparison) -> Option<SyncConflict> {
        if !comparison.is_different {
            return None;
        }

        let (conflict_type, suggested, description) =
            match (comparison.exists_local, comparison.exists_remote) {
                (true, true) => (
                    ConflictType::BothModified,
                    ConflictResolution::NewerWins,
                    BOTH_MODIFIED_DESCRIPTION,
                ),
                (true, false) => (
                    ConflictType::LocalOnly,
                    ConflictResolution::LocalWins,
                    LOCAL_ONLY_DESCRIPTION,
                ),
                (false, true) => (
                    ConflictType::RemoteOnly,
                    ConflictResolution::RemoteWins,
                    REMOTE_ONLY_DESCRIPTION,
                ),
                (false, false) => return None,
            };

        Some(SyncConflict::new(
            comparison.clone(),
            conflict_type,
            suggested,
            description,
        ))
    }

    /// Returns true if `comparison` must go through conflict resolution
    /// before any action is planned for it
    pub fn requires_resolution(direction: SyncDirection, comparison: &FileComparison) -> bool {
        direction == SyncDirection::Bidirectional && comparison.is_modified_on_both()
    }

    /// Genuine conflicts among `comparisons` for `direction`
    pub fn detect<'a, I>(comparisons: I, direction: SyncDirection) -> Vec<SyncConflict>
    where
        I: IntoIterator<Item = &'a FileComparison>,
    {
        let conflicts: Vec<SyncConflict> = comparisons
            .into_iter()
            .filter(|c| Self::requires_resolution(direction, c))
            .filter_map(Self::classify)
            .collect();

        debug!(
            direction = %direction,
            conflicts = conflicts.len(),
            "Conflict detection finished"
        );
        conflicts
    }
}
