//! Configuration module for TreeSync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::profile::SyncConfig;

/// Lower bound for the scheduler poll interval, in seconds.
pub const MIN_SCHEDULER_POLL_SECS: u64 = 10;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for TreeSync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub backup: BackupConfig,
    pub logging: LoggingConfig,
    pub remote: RemoteConfig,
    /// Profiles registered at daemon start-up.
    pub profiles: Vec<SyncConfig>,
}

/// Sync service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds between scheduler polls (minimum 10).
    pub scheduler_poll_interval_secs: u64,
    /// Finished instances kept for progress queries before pruning.
    pub max_finished_instances: usize,
    /// Base delay of the per-action retry backoff, in milliseconds.
    pub retry_base_delay_ms: u64,
}

/// Backup snapshot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Directory receiving snapshots. `None` places each snapshot next to
    /// the backed-up path.
    pub directory: Option<PathBuf>,
    /// Snapshots kept per path by the cleanup pass.
    pub max_versions: u32,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `text` or `json`.
    pub format: String,
}

/// Remote store settings for the directory-backed store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Directory acting as the remote root.
    pub root: PathBuf,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/treesync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("treesync")
            .join("config.yaml")
    }

    /// Scheduler poll interval, clamped to the minimum.
    pub fn scheduler_poll_interval(&self) -> Duration {
        Duration::from_secs(
            self.engine
                .scheduler_poll_interval_secs
                .max(MIN_SCHEDULER_POLL_SECS),
        )
    }

    /// Retry backoff base delay.
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.engine.retry_base_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// Section defaults
// ---------------------------------------------------------------------------

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scheduler_poll_interval_secs: 30,
            max_finished_instances: 50,
            retry_base_delay_ms: 1000,
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            directory: None,
            max_versions: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            root: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("treesync")
                .join("remote"),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"engine.max_finished_instances"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- engine ---
        if self.engine.scheduler_poll_interval_secs < MIN_SCHEDULER_POLL_SECS {
            errors.push(ValidationError {
                field: "engine.scheduler_poll_interval_secs".into(),
                message: format!("must be at least {MIN_SCHEDULER_POLL_SECS}"),
            });
        }
        if self.engine.max_finished_instances == 0 {
            errors.push(ValidationError {
                field: "engine.max_finished_instances".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- backup ---
        if self.backup.max_versions == 0 {
            errors.push(ValidationError {
                field: "backup.max_versions".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError {
                field: "logging.format".into(),
                message: format!(
                    "invalid format '{}'; expected one of: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        // --- profiles ---
        let mut seen = HashSet::new();
        for (i, profile) in self.profiles.iter().enumerate() {
            if let Err(e) = profile.validate() {
                errors.push(ValidationError {
                    field: format!("profiles[{i}]"),
                    message: e.to_string(),
                });
            }
            if !seen.insert(profile.name.as_str()) {
                errors.push(ValidationError {
                    field: format!("profiles[{i}].name"),
                    message: format!("duplicate profile name '{}'", profile.name),
                });
            }
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Config`], starting from defaults.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start from [`Config::default`].
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- engine ---

    pub fn scheduler_poll_interval_secs(mut self, seconds: u64) -> Self {
        self.config.engine.scheduler_poll_interval_secs = seconds;
        self
    }

    pub fn max_finished_instances(mut self, n: usize) -> Self {
        self.config.engine.max_finished_instances = n;
        self
    }

    pub fn retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.config.engine.retry_base_delay_ms = ms;
        self
    }

    // --- backup ---

    pub fn backup_directory(mut self, dir: PathBuf) -> Self {
        self.config.backup.directory = Some(dir);
        self
    }

    pub fn backup_max_versions(mut self, n: u32) -> Self {
        self.config.backup.max_versions = n;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- remote ---

    pub fn remote_root(mut self, root: PathBuf) -> Self {
        self.config.remote.root = root;
        self
    }

    // --- profiles ---

    pub fn profile(mut self, profile: SyncConfig) -> Self {
        self.config.profiles.push(profile);
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
