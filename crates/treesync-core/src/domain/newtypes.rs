//! Domain newtypes
//!
//! Strongly-typed identifiers for profiles, sync runs, backups and
//! in-flight transfers, plus the opaque handle a remote store hands out
//! for a resolved node.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// UUID-based ID types
// ============================================================================

/// Identifier of a registered sync profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(Uuid);

impl ProfileId {
    /// Create a new random ProfileId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a ProfileId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ProfileId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ProfileId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "profile_{}", self.0.simple())
    }
}

impl FromStr for ProfileId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("profile_").unwrap_or(s);
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid ProfileId: {e}")))
    }
}

/// Identifier of one sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncId(Uuid);

impl SyncId {
    /// Create a new random SyncId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SyncId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SyncId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "sync_{}", self.0.simple())
    }
}

impl FromStr for SyncId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("sync_").unwrap_or(s);
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid SyncId: {e}")))
    }
}

/// Identifier of a backup snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackupId(Uuid);

impl BackupId {
    /// Create a new random BackupId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BackupId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for BackupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "backup_{}", self.0.simple())
    }
}

impl FromStr for BackupId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("backup_").unwrap_or(s);
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid BackupId: {e}")))
    }
}

// ============================================================================
// Remote store handles
// ============================================================================

/// Opaque reference to a node in the remote store
///
/// Only the store that produced a handle can interpret it. The engine
/// never inspects the contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteHandle(String);

impl RemoteHandle {
    /// Wrap a store-specific node reference
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the raw store-specific reference
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RemoteHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle of one asynchronous upload or download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferHandle(u64);

impl TransferHandle {
    /// Wrap a raw transfer number
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw transfer number
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl Display for TransferHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "transfer#{}", self.0)
    }
}
