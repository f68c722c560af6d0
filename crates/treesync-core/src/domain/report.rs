//! Run reports and lifetime statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{ProfileId, SyncId};
use super::progress::InstanceState;

/// Summary of one finished run, kept until explicitly cleared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub sync_id: SyncId,
    /// `None` for ad-hoc runs started without a registered profile
    pub profile_id: Option<ProfileId>,
    pub sync_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub files_uploaded: u64,
    pub files_downloaded: u64,
    pub files_deleted: u64,
    pub folders_created: u64,
    pub folders_deleted: u64,
    /// Planned actions never attempted (cancellation) plus unresolved conflicts
    pub files_skipped: u64,
    pub files_failed: u64,
    pub conflicts_resolved: u64,
    pub conflicts_unresolved: u64,
    pub bytes_uploaded: u64,
    pub bytes_downloaded: u64,
    pub errors: Vec<String>,
    pub final_state: InstanceState,
    pub success: bool,
}

impl SyncReport {
    /// Starts an empty report for a run beginning now
    pub fn begin(
        sync_id: SyncId,
        profile_id: Option<ProfileId>,
        sync_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            sync_id,
            profile_id,
            sync_name: sync_name.into(),
            start_time: now,
            end_time: now,
            files_uploaded: 0,
            files_downloaded: 0,
            files_deleted: 0,
            folders_created: 0,
            folders_deleted: 0,
            files_skipped: 0,
            files_failed: 0,
            conflicts_resolved: 0,
            conflicts_unresolved: 0,
            bytes_uploaded: 0,
            bytes_downloaded: 0,
            errors: Vec::new(),
            final_state: InstanceState::Idle,
            success: false,
        }
    }

    /// Records a per-file failure
    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.files_failed += 1;
        self.errors.push(message.into());
    }

    /// Seals the report with the run's terminal state
    ///
    /// A run succeeds only if it completed with no failed action.
    pub fn finish(&mut self, state: InstanceState) {
        self.end_time = Utc::now();
        self.success = state.is_success() && self.files_failed == 0;
        self.final_state = state;
    }

    /// Number of actions that changed something
    pub fn total_changes(&self) -> u64 {
        self.files_uploaded
            + self.files_downloaded
            + self.files_deleted
            + self.folders_created
            + self.folders_deleted
    }

    /// Wall-clock duration in milliseconds
    pub fn duration_ms(&self) -> i64 {
        (self.end_time - self.start_time).num_milliseconds()
    }
}

/// Lifetime counters of a sync service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatistics {
    pub total_bytes_uploaded: u64,
    pub total_bytes_downloaded: u64,
    pub total_syncs: u64,
    pub successful_syncs: u64,
    pub failed_syncs: u64,
    pub uptime_secs: u64,
    pub active_profiles: u64,
    pub active_syncs: u64,
    pub scheduled_syncs: u64,
}

impl SyncStatistics {
    /// Pretty JSON rendering
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_success_requires_no_failures() {
        let mut report = SyncReport::begin(SyncId::new(), None, "docs");
        report.files_uploaded = 2;
        report.finish(InstanceState::Completed);
        assert!(report.success);
        assert_eq!(report.total_changes(), 2);

        let mut report = SyncReport::begin(SyncId::new(), None, "docs");
        report.record_failure("Upload failed for a.txt: disk full");
        report.finish(InstanceState::Completed);
        assert!(!report.success);
        assert_eq!(report.files_failed, 1);
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn test_cancelled_report_is_not_success() {
        let mut report = SyncReport::begin(SyncId::new(), Some(ProfileId::new()), "docs");
        report.finish(InstanceState::Cancelled);
        assert!(!report.success);
        assert_eq!(report.final_state, InstanceState::Cancelled);
        assert!(report.duration_ms() >= 0);
    }

    #[test]
    fn test_statistics_json() {
        let stats = SyncStatistics {
            total_syncs: 3,
            successful_syncs: 2,
            failed_syncs: 1,
            ..Default::default()
        };
        let json = stats.to_json().unwrap();
        assert!(json.contains("\"total_syncs\": 3"));
        assert!(json.contains("\"failed_syncs\": 1"));
    }
}
