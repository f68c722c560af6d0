//! Sync filters
//!
//! [`SyncFilter`] is a pure value object owned by a profile. It only
//! describes the rules; evaluation lives in the sync crate's filter engine.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Caller-supplied predicate; returning `false` excludes the candidate
pub type CustomPredicate = Arc<dyn Fn(&FilterCandidate) -> bool + Send + Sync>;

/// A path offered to the filter, with whatever metadata is known about it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCandidate {
    /// Path relative to the sync root, `/`-separated
    pub relative_path: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

impl FilterCandidate {
    /// Candidate for a regular file
    pub fn file(
        relative_path: impl Into<String>,
        size: u64,
        modified: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            relative_path: relative_path.into(),
            is_dir: false,
            size,
            modified,
        }
    }

    /// Candidate for a directory
    pub fn dir(relative_path: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            is_dir: true,
            size: 0,
            modified: None,
        }
    }

    /// Final path component
    pub fn name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }

    /// Lowercased extension without the dot, if any
    pub fn extension(&self) -> Option<String> {
        let name = self.name();
        match name.rfind('.') {
            Some(0) | None => None,
            Some(pos) => Some(name[pos + 1..].to_ascii_lowercase()),
        }
    }
}

/// Include/exclude rules deciding which paths take part in a sync
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncFilter {
    /// Substring patterns; when non-empty one must match
    pub include_patterns: Vec<String>,
    /// Substring patterns; any match excludes
    pub exclude_patterns: Vec<String>,
    /// Extensions (with or without the dot); when non-empty one must match
    pub include_extensions: Vec<String>,
    /// Extensions (with or without the dot); any match excludes
    pub exclude_extensions: Vec<String>,
    pub min_file_size: u64,
    pub max_file_size: u64,
    pub modified_after: Option<DateTime<Utc>>,
    pub modified_before: Option<DateTime<Utc>>,
    /// Exclude names starting with `.`
    pub exclude_hidden: bool,
    /// Exclude OS metadata files such as `Thumbs.db` and `.DS_Store`
    pub exclude_system: bool,
    /// Exclude names ending in `~`, `.tmp` or `.temp`
    pub exclude_temporary: bool,
    pub follow_symlinks: bool,
    /// Evaluated first; never serialized
    #[serde(skip)]
    pub custom: Option<CustomPredicate>,
}

impl Default for SyncFilter {
    fn default() -> Self {
        Self {
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            include_extensions: Vec::new(),
            exclude_extensions: Vec::new(),
            min_file_size: 0,
            max_file_size: u64::MAX,
            modified_after: None,
            modified_before: None,
            exclude_hidden: false,
            exclude_system: false,
            exclude_temporary: true,
            follow_symlinks: false,
            custom: None,
        }
    }
}

impl SyncFilter {
    /// Attaches a custom predicate
    pub fn with_custom<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&FilterCandidate) -> bool + Send + Sync + 'static,
    {
        self.custom = Some(Arc::new(predicate));
        self
    }
}

impl fmt::Debug for SyncFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncFilter")
            .field("include_patterns", &self.include_patterns)
            .field("exclude_patterns", &self.exclude_patterns)
            .field("include_extensions", &self.include_extensions)
            .field("exclude_extensions", &self.exclude_extensions)
            .field("min_file_size", &self.min_file_size)
            .field("max_file_size", &self.max_file_size)
            .field("modified_after", &self.modified_after)
            .field("modified_before", &self.modified_before)
            .field("exclude_hidden", &self.exclude_hidden)
            .field("exclude_system", &self.exclude_system)
            .field("exclude_temporary", &self.exclude_temporary)
            .field("follow_symlinks", &self.follow_symlinks)
            .field("custom", &self.custom.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
