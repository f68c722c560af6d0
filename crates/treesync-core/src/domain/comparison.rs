//! Per-path comparison between the local and remote trees
//!
//! A [`FileComparison`] is ephemeral: produced fresh by every analysis and
//! never persisted.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which side of the pairing an action or entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Local,
    Remote,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Local => write!(f, "local"),
            Side::Remote => write!(f, "remote"),
        }
    }
}

/// Metadata of a file as seen on one side
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SideMetadata {
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    /// Content checksum, when the side can provide one
    pub checksum: Option<String>,
}

/// Why two sides of a path are considered different
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifferenceReason {
    OnlyLocal,
    OnlyRemote,
    SizeMismatch,
    ModificationTimeDiffers,
    ChecksumMismatch,
}

impl fmt::Display for DifferenceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DifferenceReason::OnlyLocal => "Only exists locally",
            DifferenceReason::OnlyRemote => "Only exists remotely",
            DifferenceReason::SizeMismatch => "Size mismatch",
            DifferenceReason::ModificationTimeDiffers => "Modification time differs",
            DifferenceReason::ChecksumMismatch => "Checksum mismatch",
        };
        f.write_str(text)
    }
}

/// Outcome of comparing one relative path across both trees
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileComparison {
    /// Path relative to both roots, `/`-separated
    pub path: String,
    pub exists_local: bool,
    pub exists_remote: bool,
    pub local_size: u64,
    pub remote_size: u64,
    pub local_modified: Option<DateTime<Utc>>,
    pub remote_modified: Option<DateTime<Utc>>,
    pub local_checksum: Option<String>,
    /// Usually empty: most remote stores do not expose a content hash
    pub remote_checksum: Option<String>,
    pub is_different: bool,
    pub difference_reason: Option<DifferenceReason>,
}

impl FileComparison {
    /// Compares the two sides of `path`
    ///
    /// Existence is checked first, then size, then modification time at
    /// whole-second resolution, then checksums when both sides have one.
    /// At least one side is expected to be present.
    pub fn compute(
        path: impl Into<String>,
        local: Option<&SideMetadata>,
        remote: Option<&SideMetadata>,
    ) -> Self {
        let reason = match (local, remote) {
            (Some(_), None) => Some(DifferenceReason::OnlyLocal),
            (None, Some(_)) => Some(DifferenceReason::OnlyRemote),
            (Some(l), Some(r)) => Self::compare_present(l, r),
            (None, None) => None,
        };

        Self {
            path: path.into(),
            exists_local: local.is_some(),
            exists_remote: remote.is_some(),
            local_size: local.map_or(0, |m| m.size),
            remote_size: remote.map_or(0, |m| m.size),
            local_modified: local.and_then(|m| m.modified),
            remote_modified: remote.and_then(|m| m.modified),
            local_checksum: local.and_then(|m| m.checksum.clone()),
            remote_checksum: remote.and_then(|m| m.checksum.clone()),
            is_different: reason.is_some(),
            difference_reason: reason,
        }
    }

    fn compare_present(local: &SideMetadata, remote: &SideMetadata) -> Option<DifferenceReason> {
        if local.size != remote.size {
            return Some(DifferenceReason::SizeMismatch);
        }
        let secs = |m: &SideMetadata| m.modified.map(|t| t.timestamp());
        if secs(local) != secs(remote) {
            return Some(DifferenceReason::ModificationTimeDiffers);
        }
        match (&local.checksum, &remote.checksum) {
            (Some(l), Some(r)) if !l.is_empty() && !r.is_empty() && l != r => {
                Some(DifferenceReason::ChecksumMismatch)
            }
            _ => None,
        }
    }

    /// True when the file exists on both sides and differs
    pub fn is_modified_on_both(&self) -> bool {
        self.exists_local && self.exists_remote && self.is_different
    }

    /// Size on `side` (0 when the file is absent there)
    pub fn size_on(&self, side: Side) -> u64 {
        match side {
            Side::Local => self.local_size,
            Side::Remote => self.remote_size,
        }
    }

    /// Modification time on `side`
    pub fn modified_on(&self, side: Side) -> Option<DateTime<Utc>> {
        match side {
            Side::Local => self.local_modified,
            Side::Remote => self.remote_modified,
        }
    }
}
