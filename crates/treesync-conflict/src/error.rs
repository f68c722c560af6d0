//! Error types for the conflict engine

use thiserror::Error;

/// Errors that can occur during conflict detection and resolution
#[derive(Debug, Error)]
pub enum ConflictError {
    /// Invalid glob pattern in conflict rule
    #[error("invalid glob pattern: {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The policy could not pick a side; the path stays in the plan's conflicts
    #[error("conflict left unresolved for {path}: {reason}")]
    Unresolved { path: String, reason: String },
}

impl ConflictError {
    pub(crate) fn unresolved(path: &str, reason: impl Into<String>) -> Self {
        ConflictError::Unresolved {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error only means "no decision yet"
    pub fn is_unresolved(&self) -> bool {
        matches!(self, ConflictError::Unresolved { .. })
    }
}
