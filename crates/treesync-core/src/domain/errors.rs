//! Domain error types
//!
//! Errors raised while constructing or transitioning domain values:
//! profile validation, identifier parsing and instance state changes.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid path format or content
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid remote path format
    #[error("Invalid remote path: {0}")]
    InvalidRemotePath(String),

    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Unknown enum value in a profile document
    #[error("Unknown {kind}: {value}")]
    UnknownVariant {
        /// Which enum was being parsed (e.g. "direction")
        kind: &'static str,
        /// The rejected input
        value: String,
    },

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}
