//! Run state and live progress
//!
//! [`InstanceState`] is the lifecycle of one sync run; [`SyncProgress`] is
//! the snapshot handed to progress callbacks after every action.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Lifecycle state of a sync instance
///
/// ```text
/// Idle → Analyzing → Syncing ⇄ Paused
///                       ↓
///          Completed | Failed | Cancelled
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    /// Created, plan not yet built
    #[default]
    Idle,
    /// Diff, filter and conflict detection running
    Analyzing,
    /// Executing the plan
    Syncing,
    /// Waiting between actions for resume or cancel
    Paused,
    /// Every action was attempted
    Completed,
    /// The run could not continue
    Failed(String),
    /// Stopped by request; the plan is partially applied
    Cancelled,
}

impl InstanceState {
    /// Returns true while the plan is being executed (including paused)
    pub fn is_active(&self) -> bool {
        matches!(self, InstanceState::Syncing | InstanceState::Paused)
    }

    /// Returns true for the terminal states
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            InstanceState::Completed | InstanceState::Failed(_) | InstanceState::Cancelled
        )
    }

    /// Returns true if the run finished normally
    pub fn is_success(&self) -> bool {
        matches!(self, InstanceState::Completed)
    }

    fn label(&self) -> &'static str {
        match self {
            InstanceState::Idle => "idle",
            InstanceState::Analyzing => "analyzing",
            InstanceState::Syncing => "syncing",
            InstanceState::Paused => "paused",
            InstanceState::Completed => "completed",
            InstanceState::Failed(_) => "failed",
            InstanceState::Cancelled => "cancelled",
        }
    }

    /// Validates and returns the next state
    pub fn transition(&self, next: InstanceState) -> Result<InstanceState, DomainError> {
        use InstanceState::*;
        let allowed = match (self, &next) {
            (Idle, Analyzing) => true,
            (Analyzing, Syncing) => true,
            (Syncing, Paused) | (Paused, Syncing) => true,
            (Syncing | Paused, Completed) => true,
            (Idle | Analyzing | Syncing | Paused, Failed(_)) => true,
            (Idle | Analyzing | Syncing | Paused, Cancelled) => true,
            _ => false,
        };
        if allowed {
            Ok(next)
        } else {
            Err(DomainError::InvalidState {
                from: self.label().to_string(),
                to: next.label().to_string(),
            })
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceState::Failed(msg) => write!(f, "failed: {}", msg),
            other => f.write_str(other.label()),
        }
    }
}

/// The action currently being executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    #[default]
    None,
    Renaming,
    CreatingFolder,
    Uploading,
    Downloading,
    Deleting,
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncOperation::None => "",
            SyncOperation::Renaming => "Renaming",
            SyncOperation::CreatingFolder => "Creating folder",
            SyncOperation::Uploading => "Uploading",
            SyncOperation::Downloading => "Downloading",
            SyncOperation::Deleting => "Deleting",
        };
        f.write_str(s)
    }
}

/// Live progress of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncProgress {
    pub sync_name: String,
    pub total_operations: u64,
    pub completed_operations: u64,
    pub failed_operations: u64,
    pub bytes_transferred: u64,
    pub total_bytes: u64,
    pub progress_percentage: f64,
    pub current_operation: SyncOperation,
    pub current_file: String,
    pub elapsed: Duration,
    pub estimated_time_remaining: Duration,
    /// Cumulative average in bytes per second
    pub current_speed: f64,
}

impl SyncProgress {
    pub fn new(sync_name: impl Into<String>, total_operations: u64, total_bytes: u64) -> Self {
        Self {
            sync_name: sync_name.into(),
            total_operations,
            total_bytes,
            ..Self::default()
        }
    }

    /// Marks the start of an action
    pub fn begin(&mut self, operation: SyncOperation, file: impl Into<String>) {
        self.current_operation = operation;
        self.current_file = file.into();
    }

    /// Records a finished action and refreshes the derived figures
    ///
    /// Failed actions still count as completed so the run always reaches
    /// `completed_operations == total_operations` when it is not cancelled.
    pub fn finish(&mut self, succeeded: bool, bytes: u64, elapsed: Duration) {
        self.completed_operations += 1;
        if !succeeded {
            self.failed_operations += 1;
        }
        self.bytes_transferred += bytes;
        self.refresh(elapsed);
    }

    /// Recomputes percentage, speed and ETA for `elapsed`
    pub fn refresh(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
        self.progress_percentage = if self.total_operations == 0 {
            100.0
        } else {
            self.completed_operations as f64 * 100.0 / self.total_operations as f64
        };

        let secs = elapsed.as_secs_f64();
        self.current_speed = if secs > 0.0 {
            self.bytes_transferred as f64 / secs
        } else {
            0.0
        };

        let remaining = self.total_bytes.saturating_sub(self.bytes_transferred);
        self.estimated_time_remaining = if self.current_speed > 0.0 {
            Duration::from_secs_f64(remaining as f64 / self.current_speed)
        } else {
            Duration::ZERO
        };
    }
}
