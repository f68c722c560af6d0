//! Sync scheduler - starts profiles whose schedule is due
//!
//! The [`SyncScheduler`] owns no schedule state of its own. On every poll
//! tick it asks the [`SyncManager`] to start whatever is due at that moment;
//! the manager decides which entries fire and advances them.
//!
//! ## Flow
//!
//! ```text
//! interval tick ─┐
//!                ├──→ SyncManager::run_due_syncs(now) ──→ start_sync(profile)
//! trigger() ─────┘
//! ```
//!
//! [`trigger`](SyncScheduler::trigger) runs a check immediately instead of
//! waiting for the next tick, for "sync now" style requests.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::manager::SyncManager;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Periodic driver for scheduled and interval syncs
pub struct SyncScheduler {
    poll_interval: Duration,
    wake: Arc<Notify>,
}

impl SyncScheduler {
    /// Creates a scheduler polling every `poll_interval`, at least 10 ms
    pub fn new(poll_interval: Duration) -> Self {
        let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        info!(
            poll_ms = poll_interval.as_millis() as u64,
            "Creating sync scheduler"
        );
        Self {
            poll_interval,
            wake: Arc::new(Notify::new()),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Requests an immediate due-check
    pub fn trigger(&self) {
        debug!("Scheduler check requested");
        self.wake.notify_one();
    }

    /// Handle that can trigger checks from another task
    pub fn trigger_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.wake)
    }

    /// Runs until `shutdown` is cancelled
    ///
    /// Runs already started are left to the manager; shutting the scheduler
    /// down only stops new ones from being started.
    pub async fn run(&self, manager: Arc<SyncManager>, shutdown: CancellationToken) {
        info!("Sync scheduler starting");

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
                _ = self.wake.notified() => {}
            }

            let started = manager.run_due_syncs(Utc::now()).await;
            if !started.is_empty() {
                info!(count = started.len(), "Scheduled syncs started");
            }
        }

        info!("Sync scheduler stopped");
    }
}
