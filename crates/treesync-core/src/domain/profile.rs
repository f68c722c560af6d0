//! Sync profiles
//!
//! A profile is a named, persisted sync configuration: which local tree
//! is paired with which remote tree, the direction data may flow, how
//! conflicts are settled, and the behavior and scheduling knobs of a run.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::conflict::{ConflictResolution, ConflictRule};
use super::errors::DomainError;
use super::filter::SyncFilter;
use super::newtypes::ProfileId;

/// Default transfer chunk size (10 MiB)
pub const DEFAULT_CHUNK_SIZE: u64 = 10 * 1024 * 1024;

/// Default auto-sync interval (30 minutes)
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30 * 60;

// ============================================================================
// SyncDirection
// ============================================================================

/// Which side(s) may be written to during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// Both sides may change; concurrent edits become conflicts
    #[default]
    Bidirectional,
    /// Upload only; remote orphans removed when `delete_orphans` is set
    LocalToRemote,
    /// Download only; local orphans removed when `delete_orphans` is set
    RemoteToLocal,
    /// Remote becomes an exact copy of local
    MirrorLocal,
    /// Local becomes an exact copy of remote
    MirrorRemote,
}

impl SyncDirection {
    /// All directions, in declaration order
    pub const ALL: [SyncDirection; 5] = [
        SyncDirection::Bidirectional,
        SyncDirection::LocalToRemote,
        SyncDirection::RemoteToLocal,
        SyncDirection::MirrorLocal,
        SyncDirection::MirrorRemote,
    ];

    /// Returns true if this direction can write to the remote side
    pub fn uploads(&self) -> bool {
        matches!(
            self,
            SyncDirection::Bidirectional | SyncDirection::LocalToRemote | SyncDirection::MirrorLocal
        )
    }

    /// Returns true if this direction can write to the local side
    pub fn downloads(&self) -> bool {
        matches!(
            self,
            SyncDirection::Bidirectional
                | SyncDirection::RemoteToLocal
                | SyncDirection::MirrorRemote
        )
    }

    /// Returns true for the two mirror modes
    pub fn is_mirror(&self) -> bool {
        matches!(self, SyncDirection::MirrorLocal | SyncDirection::MirrorRemote)
    }

    /// The canonical snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncDirection::Bidirectional => "bidirectional",
            SyncDirection::LocalToRemote => "local_to_remote",
            SyncDirection::RemoteToLocal => "remote_to_local",
            SyncDirection::MirrorLocal => "mirror_local",
            SyncDirection::MirrorRemote => "mirror_remote",
        }
    }
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncDirection {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SyncDirection::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| DomainError::UnknownVariant {
                kind: "direction",
                value: s.to_string(),
            })
    }
}

// ============================================================================
// SyncConfig
// ============================================================================

/// Configuration of one sync pairing
///
/// Every field has a default so partial YAML or JSON documents load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Human-readable profile name
    pub name: String,
    /// Root of the local tree
    pub local_path: PathBuf,
    /// Root of the remote tree, `/`-separated
    pub remote_path: String,
    /// Which side(s) may be written to
    pub direction: SyncDirection,
    /// Default policy applied to detected conflicts
    pub conflict_strategy: ConflictResolution,
    /// Per-path policy overrides, first match wins
    pub conflict_rules: Vec<ConflictRule>,
    /// Which paths take part in the sync
    pub filter: SyncFilter,

    // -- performance --
    pub max_concurrent_transfers: u32,
    /// Bytes per second, 0 = unlimited
    pub bandwidth_limit: u64,
    pub chunk_size: u64,
    pub use_delta_sync: bool,

    // -- behavior --
    pub delete_orphans: bool,
    pub preserve_timestamps: bool,
    pub preserve_permissions: bool,
    pub case_insensitive: bool,
    pub verify_transfers: bool,
    pub sync_empty_folders: bool,
    pub recursive: bool,

    // -- scheduling --
    pub auto_sync: bool,
    pub sync_interval_secs: u64,
    pub scheduled_times: Vec<DateTime<Utc>>,

    // -- backups --
    pub create_backups: bool,
    pub max_backup_versions: u32,

    // -- error handling --
    pub retry_on_error: bool,
    pub max_retries: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            local_path: PathBuf::new(),
            remote_path: String::new(),
            direction: SyncDirection::Bidirectional,
            conflict_strategy: ConflictResolution::NewerWins,
            conflict_rules: Vec::new(),
            filter: SyncFilter::default(),
            max_concurrent_transfers: 4,
            bandwidth_limit: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
            use_delta_sync: true,
            delete_orphans: false,
            preserve_timestamps: true,
            preserve_permissions: false,
            case_insensitive: false,
            verify_transfers: true,
            sync_empty_folders: true,
            recursive: true,
            auto_sync: false,
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            scheduled_times: Vec::new(),
            create_backups: true,
            max_backup_versions: 5,
            retry_on_error: true,
            max_retries: 3,
        }
    }
}

impl SyncConfig {
    /// Creates a config with the given pairing and default knobs
    pub fn new(
        name: impl Into<String>,
        local_path: impl Into<PathBuf>,
        remote_path: impl Into<String>,
        direction: SyncDirection,
    ) -> Self {
        Self {
            name: name.into(),
            local_path: local_path.into(),
            remote_path: remote_path.into(),
            direction,
            ..Self::default()
        }
    }

    /// Auto-sync interval as a [`Duration`]
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    /// Checks the fields every run depends on
    ///
    /// Path existence is not checked here; that happens at analysis time.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::ValidationFailed(
                "profile name must not be empty".into(),
            ));
        }
        if self.local_path.as_os_str().is_empty() {
            return Err(DomainError::InvalidPath("local path must not be empty".into()));
        }
        if self.remote_path.trim().is_empty() {
            return Err(DomainError::InvalidRemotePath(
                "remote path must not be empty".into(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(DomainError::ValidationFailed(
                "chunk_size must be greater than 0".into(),
            ));
        }
        if self.auto_sync && self.sync_interval_secs == 0 {
            return Err(DomainError::ValidationFailed(
                "sync_interval_secs must be greater than 0 when auto_sync is enabled".into(),
            ));
        }
        if self.filter.min_file_size > self.filter.max_file_size {
            return Err(DomainError::ValidationFailed(
                "filter.min_file_size exceeds filter.max_file_size".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SyncProfile
// ============================================================================

/// A registered [`SyncConfig`] with its identity and bookkeeping timestamps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncProfile {
    id: ProfileId,
    config: SyncConfig,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SyncProfile {
    /// Creates a profile with a fresh id
    pub fn new(config: SyncConfig) -> Self {
        let now = Utc::now();
        Self {
            id: ProfileId::new(),
            config,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &ProfileId {
        &self.id
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Replaces the configuration, keeping the id
    pub fn update(&mut self, config: SyncConfig) {
        self.config = config;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let cfg = SyncConfig::default();
        assert_eq!(cfg.direction, SyncDirection::Bidirectional);
        assert_eq!(cfg.conflict_strategy, ConflictResolution::NewerWins);
        assert_eq!(cfg.max_concurrent_transfers, 4);
        assert_eq!(cfg.chunk_size, 10 * 1024 * 1024);
        assert_eq!(cfg.sync_interval(), Duration::from_secs(1800));
        assert!(cfg.preserve_timestamps);
        assert!(cfg.verify_transfers);
        assert!(cfg.create_backups);
        assert!(!cfg.delete_orphans);
        assert_eq!(cfg.max_backup_versions, 5);
        assert_eq!(cfg.max_retries, 3);
    }

    #[test]
    fn test_direction_capabilities() {
        assert!(SyncDirection::Bidirectional.uploads());
        assert!(SyncDirection::Bidirectional.downloads());
        assert!(SyncDirection::MirrorLocal.uploads());
        assert!(!SyncDirection::MirrorLocal.downloads());
        assert!(!SyncDirection::RemoteToLocal.uploads());
        assert!(SyncDirection::MirrorRemote.is_mirror());
        assert!(!SyncDirection::LocalToRemote.is_mirror());
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!(
            "mirror_remote".parse::<SyncDirection>().unwrap(),
            SyncDirection::MirrorRemote
        );
        assert!("upward".parse::<SyncDirection>().is_err());
        for d in SyncDirection::ALL {
            assert_eq!(d.to_string().parse::<SyncDirection>().unwrap(), d);
        }
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        let mut cfg = SyncConfig::new("docs", "/tmp/docs", "/docs", SyncDirection::Bidirectional);
        assert!(cfg.validate().is_ok());

        cfg.name = "  ".into();
        assert!(matches!(cfg.validate(), Err(DomainError::ValidationFailed(_))));

        let cfg = SyncConfig::new("docs", "", "/docs", SyncDirection::Bidirectional);
        assert!(matches!(cfg.validate(), Err(DomainError::InvalidPath(_))));

        let cfg = SyncConfig::new("docs", "/tmp/docs", "", SyncDirection::Bidirectional);
        assert!(matches!(cfg.validate(), Err(DomainError::InvalidRemotePath(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_size_bounds() {
        let mut cfg = SyncConfig::new("docs", "/tmp/docs", "/docs", SyncDirection::Bidirectional);
        cfg.filter.min_file_size = 100;
        cfg.filter.max_file_size = 10;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let json = r#"{
            "name": "photos",
            "local_path": "/p",
            "remote_path": "/Photos",
            "direction": "mirror_local"
        }"#;
        let cfg: SyncConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.direction, SyncDirection::MirrorLocal);
        assert_eq!(cfg.max_retries, 3);
        assert!(cfg.filter.exclude_temporary);
    }

    #[test]
    fn test_profile_update_keeps_id() {
        let mut profile = SyncProfile::new(SyncConfig::new(
            "a",
            "/a",
            "/a",
            SyncDirection::Bidirectional,
        ));
        let id = *profile.id();
        let mut cfg = profile.config().clone();
        cfg.name = "renamed".into();
        profile.update(cfg);
        assert_eq!(*profile.id(), id);
        assert_eq!(profile.name(), "renamed");
        assert!(profile.updated_at() >= profile.created_at());
    }
}
