//! Conflict domain entities
//!
//! Types describing a path whose two sides disagree, the policies that
//! can settle it, and the record of how it was settled.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::comparison::FileComparison;
use super::errors::DomainError;

/// Classification of a differing path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Present on both sides with different content
    BothModified,
    /// Present only in the local tree
    LocalOnly,
    /// Present only in the remote tree
    RemoteOnly,
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConflictType::BothModified => "both_modified",
            ConflictType::LocalOnly => "local_only",
            ConflictType::RemoteOnly => "remote_only",
        };
        f.write_str(s)
    }
}

/// How a conflict should be or was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// The side with the later modification time wins
    #[default]
    NewerWins,
    /// The side with the earlier modification time wins
    OlderWins,
    LargerWins,
    SmallerWins,
    /// Upload the local version over the remote one
    LocalWins,
    /// Download the remote version over the local one
    RemoteWins,
    /// Keep both: the local copy is renamed, then both versions are synced
    RenameBoth,
    /// Ask the registered interactive callback
    AskUser,
    /// Run the registered programmatic callback
    Custom,
}

impl ConflictResolution {
    /// All policies, in declaration order
    pub const ALL: [ConflictResolution; 9] = [
        ConflictResolution::NewerWins,
        ConflictResolution::OlderWins,
        ConflictResolution::LargerWins,
        ConflictResolution::SmallerWins,
        ConflictResolution::LocalWins,
        ConflictResolution::RemoteWins,
        ConflictResolution::RenameBoth,
        ConflictResolution::AskUser,
        ConflictResolution::Custom,
    ];

    /// The canonical snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictResolution::NewerWins => "newer_wins",
            ConflictResolution::OlderWins => "older_wins",
            ConflictResolution::LargerWins => "larger_wins",
            ConflictResolution::SmallerWins => "smaller_wins",
            ConflictResolution::LocalWins => "local_wins",
            ConflictResolution::RemoteWins => "remote_wins",
            ConflictResolution::RenameBoth => "rename_both",
            ConflictResolution::AskUser => "ask_user",
            ConflictResolution::Custom => "custom",
        }
    }

    /// True for policies that delegate the decision to a callback
    pub fn is_delegated(&self) -> bool {
        matches!(self, ConflictResolution::AskUser | ConflictResolution::Custom)
    }
}

impl fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictResolution {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConflictResolution::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| DomainError::UnknownVariant {
                kind: "conflict resolution",
                value: s.to_string(),
            })
    }
}

/// Per-path policy override matched by glob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRule {
    /// Glob pattern against the relative path (e.g. `"**/*.docx"`)
    pub pattern: String,
    pub resolution: ConflictResolution,
}

impl ConflictRule {
    pub fn new(pattern: impl Into<String>, resolution: ConflictResolution) -> Self {
        Self {
            pattern: pattern.into(),
            resolution,
        }
    }
}

/// Where an applied resolution came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// The profile's default conflict strategy
    Strategy,
    /// A matching per-path conflict rule
    Rule,
    /// A resolution recorded ahead of the run by the caller
    Caller,
    /// The interactive callback
    User,
    /// The programmatic callback
    Custom,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResolutionSource::Strategy => "strategy",
            ResolutionSource::Rule => "rule",
            ResolutionSource::Caller => "caller",
            ResolutionSource::User => "user",
            ResolutionSource::Custom => "custom",
        };
        f.write_str(s)
    }
}

/// A differing path flagged by the conflict detector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    pub path: String,
    pub conflict_type: ConflictType,
    pub comparison: FileComparison,
    pub suggested_resolution: ConflictResolution,
    pub description: String,
}

impl SyncConflict {
    pub fn new(
        comparison: FileComparison,
        conflict_type: ConflictType,
        suggested_resolution: ConflictResolution,
        description: impl Into<String>,
    ) -> Self {
        Self {
            path: comparison.path.clone(),
            conflict_type,
            comparison,
            suggested_resolution,
            description: description.into(),
        }
    }
}
