//! Scheduled runs

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::ProfileId;

/// Intervals beyond what chrono can represent are clamped to a century
fn to_chrono(interval: Duration) -> chrono::Duration {
    chrono::Duration::from_std(interval).unwrap_or_else(|_| chrono::Duration::days(36_500))
}

/// One entry polled by the scheduler
///
/// An `interval` of zero makes the entry one-shot: it is disabled after
/// it fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledSync {
    profile_id: ProfileId,
    next_run: DateTime<Utc>,
    interval: Duration,
    enabled: bool,
    last_run: Option<DateTime<Utc>>,
    consecutive_failures: u32,
}

impl ScheduledSync {
    /// Repeating entry first due one `interval` after `now`
    pub fn repeating(profile_id: ProfileId, interval: Duration, now: DateTime<Utc>) -> Self {
        Self {
            profile_id,
            next_run: now + to_chrono(interval),
            interval,
            enabled: true,
            last_run: None,
            consecutive_failures: 0,
        }
    }

    /// One-shot entry due at `at`
    pub fn one_shot(profile_id: ProfileId, at: DateTime<Utc>) -> Self {
        Self {
            profile_id,
            next_run: at,
            interval: Duration::ZERO,
            enabled: true,
            last_run: None,
            consecutive_failures: 0,
        }
    }

    pub fn profile_id(&self) -> &ProfileId {
        &self.profile_id
    }

    pub fn next_run(&self) -> DateTime<Utc> {
        self.next_run
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        self.last_run
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn is_one_shot(&self) -> bool {
        self.interval.is_zero()
    }

    /// Enabled and `next_run <= now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_run <= now
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Records a firing and reschedules or disables the entry
    pub fn mark_fired(&mut self, now: DateTime<Utc>, started: bool) {
        self.last_run = Some(now);
        if started {
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures += 1;
        }

        if self.is_one_shot() {
            self.enabled = false;
        } else {
            self.next_run = now + to_chrono(self.interval);
        }
    }
}
