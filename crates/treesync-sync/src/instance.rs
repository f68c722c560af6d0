//! Sync instance
//!
//! One [`SyncInstance`] exists per run. It owns the run's state machine,
//! live progress, the plan it executes and the report it builds, plus the
//! pause and cancel signals the executor observes between actions.
//!
//! Pause is a `watch<bool>` and cancel a [`CancellationToken`]; a paused
//! executor sleeps on both and consumes no CPU until one fires.

use chrono::{DateTime, Utc};
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use treesync_core::domain::{
    DomainError, InstanceState, ProfileId, SyncConfig, SyncId, SyncPlan, SyncProgress, SyncReport,
};

/// A single run of a profile (or of an ad-hoc config)
#[derive(Debug)]
pub struct SyncInstance {
    id: SyncId,
    profile_id: Option<ProfileId>,
    config: SyncConfig,
    started_at: DateTime<Utc>,
    state: watch::Sender<InstanceState>,
    paused: watch::Sender<bool>,
    cancel: CancellationToken,
    progress: RwLock<SyncProgress>,
    report: RwLock<SyncReport>,
    plan: RwLock<Option<SyncPlan>>,
}

impl SyncInstance {
    pub fn new(profile_id: Option<ProfileId>, config: SyncConfig) -> Self {
        let id = SyncId::new();
        let report = SyncReport::begin(id, profile_id, config.name.clone());
        Self {
            id,
            profile_id,
            progress: RwLock::new(SyncProgress::new(config.name.clone(), 0, 0)),
            report: RwLock::new(report),
            config,
            started_at: Utc::now(),
            state: watch::channel(InstanceState::Idle).0,
            paused: watch::channel(false).0,
            cancel: CancellationToken::new(),
            plan: RwLock::new(None),
        }
    }

    pub fn id(&self) -> SyncId {
        self.id
    }

    pub fn profile_id(&self) -> Option<ProfileId> {
        self.profile_id
    }

    /// Snapshot of the config the run was started with
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    // ========================================================================
    // State machine
    // ========================================================================

    pub fn state(&self) -> InstanceState {
        self.state.borrow().clone()
    }

    /// Moves to `next` if the state machine allows it
    pub fn transition(&self, next: InstanceState) -> Result<(), DomainError> {
        let mut outcome = Ok(());
        self.state.send_if_modified(|current| match current.transition(next) {
            Ok(state) => {
                debug!(sync_id = %self.id, from = %current, to = %state, "Instance state changed");
                *current = state;
                true
            }
            Err(e) => {
                outcome = Err(e);
                false
            }
        });
        outcome
    }

    /// Moves `from` → `to` only if currently in `from`
    fn swap_state(&self, from: &InstanceState, to: InstanceState) {
        self.state.send_if_modified(|current| {
            if current == from {
                *current = to;
                true
            } else {
                false
            }
        });
    }

    /// Waits until the run reaches a terminal state
    pub async fn wait_finished(&self) -> InstanceState {
        let mut rx = self.state.subscribe();
        let finished = rx
            .wait_for(InstanceState::is_finished)
            .await
            .map(|state| (*state).clone());
        // The sender lives as long as `self`, so the channel cannot close here.
        finished.unwrap_or_else(|_| self.state())
    }

    // ========================================================================
    // Pause / cancel
    // ========================================================================

    /// Requests a pause before the next action
    pub fn pause(&self) {
        self.paused.send_replace(true);
        self.swap_state(&InstanceState::Syncing, InstanceState::Paused);
        info!(sync_id = %self.id, "Pause requested");
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
        self.swap_state(&InstanceState::Paused, InstanceState::Syncing);
        info!(sync_id = %self.id, "Resume requested");
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Requests cancellation; observed before the next action
    pub fn cancel(&self) {
        self.cancel.cancel();
        info!(sync_id = %self.id, "Cancellation requested");
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Called before every action
    ///
    /// Blocks while paused. Returns false once cancellation was requested.
    pub async fn checkpoint(&self) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        let mut paused = self.paused.subscribe();
        if *paused.borrow_and_update() {
            self.swap_state(&InstanceState::Syncing, InstanceState::Paused);
            debug!(sync_id = %self.id, "Executor paused");
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                _ = paused.wait_for(|p| !*p) => {}
            }
            self.swap_state(&InstanceState::Paused, InstanceState::Syncing);
            debug!(sync_id = %self.id, "Executor resumed");
        }

        !self.cancel.is_cancelled()
    }

    // ========================================================================
    // Progress, plan and report
    // ========================================================================

    pub async fn progress(&self) -> SyncProgress {
        self.progress.read().await.clone()
    }

    /// Applies `f` to the live progress and returns the updated snapshot
    pub async fn update_progress(&self, f: impl FnOnce(&mut SyncProgress)) -> SyncProgress {
        let mut progress = self.progress.write().await;
        f(&mut progress);
        progress.clone()
    }

    pub async fn plan(&self) -> Option<SyncPlan> {
        self.plan.read().await.clone()
    }

    pub async fn set_plan(&self, plan: SyncPlan) {
        *self.plan.write().await = Some(plan);
    }

    pub async fn report(&self) -> SyncReport {
        self.report.read().await.clone()
    }

    pub async fn update_report(&self, f: impl FnOnce(&mut SyncReport)) {
        f(&mut *self.report.write().await);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use treesync_core::domain::SyncDirection;

    use super::*;

    fn instance() -> Arc<SyncInstance> {
        Arc::new(SyncInstance::new(
            None,
            SyncConfig::new("t", "/l", "/r", SyncDirection::Bidirectional),
        ))
    }

    fn syncing() -> Arc<SyncInstance> {
        let i = instance();
        i.transition(InstanceState::Analyzing).unwrap();
        i.transition(InstanceState::Syncing).unwrap();
        i
    }

    #[test]
    fn test_rejects_invalid_transition() {
        let i = instance();
        assert!(i.transition(InstanceState::Completed).is_err());
        assert_eq!(i.state(), InstanceState::Idle);
    }

    #[tokio::test]
    async fn test_pause_blocks_checkpoint_until_resume() {
        let i = syncing();
        i.pause();
        assert_eq!(i.state(), InstanceState::Paused);

        let waiter = {
            let i = Arc::clone(&i);
            tokio::spawn(async move { i.checkpoint().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        i.resume();
        assert!(tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap());
        assert_eq!(i.state(), InstanceState::Syncing);
    }

    #[tokio::test]
    async fn test_cancel_wakes_paused_checkpoint() {
        let i = syncing();
        i.pause();
        let waiter = {
            let i = Arc::clone(&i);
            tokio::spawn(async move { i.checkpoint().await })
        };
        tokio::task::yield_now().await;
        i.cancel();
        assert!(!tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap());
    }

    #[tokio::test]
    async fn test_wait_finished() {
        let i = syncing();
        let waiter = {
            let i = Arc::clone(&i);
            tokio::spawn(async move { i.wait_finished().await })
        };
        tokio::task::yield_now().await;
        i.transition(InstanceState::Completed).unwrap();
        assert_eq!(waiter.await.unwrap(), InstanceState::Completed);
    }
}
