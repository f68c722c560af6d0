//! Sync service
//!
//! [`SyncManager`] is the entry point embedding applications talk to. It
//! owns the profile, instance, report and schedule registries, each behind
//! its own `RwLock` that is held only for the map access itself, never
//! across a diff, a transfer or a callback.
//!
//! ```text
//! start_sync(profile) ──► analyze (diff + plan) ──► register instance
//!                                                        │
//!                                              tokio::spawn(execute)
//!                                                        │
//!                                       executor task (panic ⇒ Failed)
//!                                                        │
//!                           counters + report registry ◄─┘──► terminal state
//! ```
//!
//! The manager is constructed explicitly and shared as `Arc<SyncManager>`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinError;
use tracing::{debug, error, info, instrument, warn};

use treesync_conflict::{validate_rules, ConflictDetector, ConflictResolver, PolicyEngine};
use treesync_core::config::Config;
use treesync_core::domain::{
    BackupId, BackupInfo, ConflictResolution, DomainError, FileComparison, InstanceState,
    ProfileId, RemoteHandle, ResolutionSource, ScheduledSync, SideMetadata, SyncConfig,
    SyncConflict, SyncDirection, SyncId, SyncPlan, SyncProfile, SyncProgress, SyncReport,
    SyncStatistics,
};
use treesync_core::ports::{
    ConflictDecider, ErrorCallback, ILocalFileSystem, IRemoteStore, ProgressCallback,
};

use crate::backup::BackupManager;
use crate::diff::{DiffEngine, TreeDiff};
use crate::executor::{ensure_remote_path, find_remote_file, ExecutionHooks, PlanExecutor};
use crate::instance::SyncInstance;
use crate::planner::{PlanBuilder, PlanMode};
use crate::{Result, SyncError};

// ============================================================================
// Options
// ============================================================================

/// Engine-wide settings of a [`SyncManager`]
#[derive(Debug, Clone)]
pub struct SyncManagerOptions {
    /// Finished instances kept for queries before the oldest are dropped
    pub max_finished_instances: usize,
    /// Base of the per-action retry backoff
    pub retry_base_delay: Duration,
    /// Where backups go; `None` puts them next to the original
    pub backup_directory: Option<PathBuf>,
    /// Ceiling on backup versions kept per path
    pub backup_max_versions: u32,
}

impl Default for SyncManagerOptions {
    fn default() -> Self {
        Self {
            max_finished_instances: 50,
            retry_base_delay: Duration::from_secs(1),
            backup_directory: None,
            backup_max_versions: 5,
        }
    }
}

impl From<&Config> for SyncManagerOptions {
    fn from(config: &Config) -> Self {
        Self {
            max_finished_instances: config.engine.max_finished_instances,
            retry_base_delay: config.retry_base_delay(),
            backup_directory: config.backup.directory.clone(),
            backup_max_versions: config.backup.max_versions,
        }
    }
}

#[derive(Default)]
struct Callbacks {
    ask_user: Option<ConflictDecider>,
    custom: Option<ConflictDecider>,
    progress: Option<ProgressCallback>,
    error: Option<ErrorCallback>,
}

#[derive(Debug, Default)]
struct Counters {
    bytes_uploaded: u64,
    bytes_downloaded: u64,
    total_syncs: u64,
    successful_syncs: u64,
    failed_syncs: u64,
}

// ============================================================================
// SyncManager
// ============================================================================

/// Registry-backed sync service
pub struct SyncManager {
    fs: Arc<dyn ILocalFileSystem>,
    store: Arc<dyn IRemoteStore>,
    diff: DiffEngine,
    backups: Arc<BackupManager>,
    options: SyncManagerOptions,
    started: Instant,
    profiles: RwLock<HashMap<ProfileId, SyncProfile>>,
    instances: RwLock<HashMap<SyncId, Arc<SyncInstance>>>,
    reports: RwLock<HashMap<SyncId, SyncReport>>,
    schedules: RwLock<Vec<ScheduledSync>>,
    resolutions: RwLock<HashMap<ProfileId, HashMap<String, ConflictResolution>>>,
    callbacks: RwLock<Callbacks>,
    counters: RwLock<Counters>,
}

impl SyncManager {
    pub fn new(
        fs: Arc<dyn ILocalFileSystem>,
        store: Arc<dyn IRemoteStore>,
        options: SyncManagerOptions,
    ) -> Self {
        let backups = BackupManager::new(Arc::clone(&fs), options.backup_directory.clone())
            .with_max_versions(options.backup_max_versions);
        Self {
            diff: DiffEngine::new(Arc::clone(&fs), Arc::clone(&store)),
            backups: Arc::new(backups),
            fs,
            store,
            options,
            started: Instant::now(),
            profiles: RwLock::new(HashMap::new()),
            instances: RwLock::new(HashMap::new()),
            reports: RwLock::new(HashMap::new()),
            schedules: RwLock::new(Vec::new()),
            resolutions: RwLock::new(HashMap::new()),
            callbacks: RwLock::new(Callbacks::default()),
            counters: RwLock::new(Counters::default()),
        }
    }

    async fn notify_error(&self, sync_id: &SyncId, message: &str) {
        let callback = self.callbacks.read().await.error.clone();
        if let Some(callback) = callback {
            callback(sync_id, message);
        }
    }

    // ========================================================================
    // Profiles
    // ========================================================================

    fn validate_config(config: &SyncConfig) -> Result<()> {
        config.validate()?;
        validate_rules(&config.conflict_rules)?;
        Ok(())
    }

    async fn profile_config(&self, id: &ProfileId) -> Result<SyncConfig> {
        self.profiles
            .read()
            .await
            .get(id)
            .map(|p| p.config().clone())
            .ok_or(SyncError::ProfileNotFound(*id))
    }

    /// Rebuilds the schedule entries of profile `id` from `config`
    async fn refresh_schedule(&self, id: ProfileId, config: &SyncConfig) {
        let now = Utc::now();
        let mut entries = Vec::new();
        if config.auto_sync {
            entries.push(ScheduledSync::repeating(id, config.sync_interval(), now));
        }
        entries.extend(
            config
                .scheduled_times
                .iter()
                .filter(|at| **at > now)
                .map(|at| ScheduledSync::one_shot(id, *at)),
        );

        let mut schedules = self.schedules.write().await;
        schedules.retain(|s| *s.profile_id() != id);
        schedules.extend(entries);
    }

    /// Registers a new profile
    ///
    /// # Errors
    /// [`SyncError::Domain`] or [`SyncError::Conflict`] for an invalid config.
    #[instrument(skip(self, config), fields(name = %config.name))]
    pub async fn create_sync_profile(&self, config: SyncConfig) -> Result<ProfileId> {
        Self::validate_config(&config)?;
        let profile = SyncProfile::new(config);
        let id = *profile.id();
        let config = profile.config().clone();

        self.profiles.write().await.insert(id, profile);
        self.refresh_schedule(id, &config).await;

        info!(profile_id = %id, direction = %config.direction, "Sync profile created");
        Ok(id)
    }

    /// Replaces the configuration of profile `id`
    #[instrument(skip(self, config))]
    pub async fn update_sync_profile(&self, id: &ProfileId, config: SyncConfig) -> Result<()> {
        Self::validate_config(&config)?;
        {
            let mut profiles = self.profiles.write().await;
            let profile = profiles.get_mut(id).ok_or(SyncError::ProfileNotFound(*id))?;
            profile.update(config.clone());
        }
        self.refresh_schedule(*id, &config).await;
        info!(profile_id = %id, "Sync profile updated");
        Ok(())
    }

    /// Removes profile `id`, cancelling its active runs and schedules
    #[instrument(skip(self))]
    pub async fn delete_sync_profile(&self, id: &ProfileId) -> Result<()> {
        self.profiles
            .write()
            .await
            .remove(id)
            .ok_or(SyncError::ProfileNotFound(*id))?;

        let running: Vec<Arc<SyncInstance>> = self
            .instances
            .read()
            .await
            .values()
            .filter(|i| i.profile_id() == Some(*id) && !i.state().is_finished())
            .cloned()
            .collect();
        for instance in &running {
            instance.cancel();
        }

        self.schedules
            .write()
            .await
            .retain(|s| s.profile_id() != id);
        self.resolutions.write().await.remove(id);

        info!(profile_id = %id, cancelled = running.len(), "Sync profile deleted");
        Ok(())
    }

    pub async fn get_sync_profile(&self, id: &ProfileId) -> Result<SyncProfile> {
        self.profiles
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(SyncError::ProfileNotFound(*id))
    }

    /// Every registered profile, ordered by name
    pub async fn list_sync_profiles(&self) -> Vec<SyncProfile> {
        let mut profiles: Vec<SyncProfile> = self.profiles.read().await.values().cloned().collect();
        profiles.sort_by(|a, b| a.name().cmp(b.name()));
        profiles
    }

    // ========================================================================
    // Analysis
    // ========================================================================

    async fn resolver_for(&self, config: &SyncConfig) -> ConflictResolver {
        let callbacks = self.callbacks.read().await;
        ConflictResolver::new(PolicyEngine::new(
            config.conflict_strategy,
            &config.conflict_rules,
        ))
        .with_ask_user(callbacks.ask_user.clone())
        .with_custom(callbacks.custom.clone())
    }

    async fn build_plan(
        &self,
        config: &SyncConfig,
        resolutions: &HashMap<String, ConflictResolution>,
        mode: PlanMode,
    ) -> Result<SyncPlan> {
        let diff = self.diff.calculate(config).await?;
        let resolver = self.resolver_for(config).await;
        Ok(PlanBuilder::new(config, &resolver, mode).build(&diff, resolutions))
    }

    async fn stored_resolutions(&self, id: &ProfileId) -> HashMap<String, ConflictResolution> {
        self.resolutions
            .read()
            .await
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Plan for profile `id` in its current state
    ///
    /// Only resolutions recorded with [`Self::resolve_conflict`] are applied.
    /// Every other conflict is listed in `plan.conflicts`; the strategy, the
    /// rules and the callbacks only run when a sync starts.
    pub async fn analyze_folders(&self, id: &ProfileId) -> Result<SyncPlan> {
        let config = self.profile_config(id).await?;
        let resolutions = self.stored_resolutions(id).await;
        self.build_plan(&config, &resolutions, PlanMode::Analysis).await
    }

    /// Plan for an unregistered config
    pub async fn analyze_config(&self, config: &SyncConfig) -> Result<SyncPlan> {
        Self::validate_config(config)?;
        self.build_plan(config, &HashMap::new(), PlanMode::Analysis).await
    }

    // ========================================================================
    // Runs
    // ========================================================================

    /// Starts a run of profile `id` and returns once it is executing
    ///
    /// Analysis happens before this returns: a missing local or remote root
    /// fails here and no instance is registered.
    pub async fn start_sync(self: &Arc<Self>, id: &ProfileId) -> Result<SyncId> {
        let config = self.profile_config(id).await?;
        let resolutions = self.stored_resolutions(id).await;
        self.launch(Some(*id), config, resolutions).await
    }

    /// Starts an ad-hoc run of `config` without registering a profile
    pub async fn start_custom_sync(self: &Arc<Self>, config: SyncConfig) -> Result<SyncId> {
        Self::validate_config(&config)?;
        self.launch(None, config, HashMap::new()).await
    }

    #[instrument(skip(self, config, resolutions), fields(name = %config.name))]
    async fn launch(
        self: &Arc<Self>,
        profile_id: Option<ProfileId>,
        config: SyncConfig,
        resolutions: HashMap<String, ConflictResolution>,
    ) -> Result<SyncId> {
        let instance = Arc::new(SyncInstance::new(profile_id, config));
        let sync_id = instance.id();
        instance.transition(InstanceState::Analyzing)?;

        let plan = match self
            .build_plan(instance.config(), &resolutions, PlanMode::Execution)
            .await
        {
            Ok(plan) => plan,
            Err(e) => {
                error!(sync_id = %sync_id, error = %e, "Sync analysis failed");
                {
                    let mut counters = self.counters.write().await;
                    counters.total_syncs += 1;
                    counters.failed_syncs += 1;
                }
                self.notify_error(&sync_id, &e.to_string()).await;
                return Err(e);
            }
        };

        if let Some(pid) = profile_id {
            self.consume_resolutions(&pid, &plan).await;
        }
        instance.set_plan(plan.clone()).await;
        instance.transition(InstanceState::Syncing)?;

        self.prune_finished_instances().await;
        self.instances
            .write()
            .await
            .insert(sync_id, Arc::clone(&instance));

        info!(
            sync_id = %sync_id,
            operations = plan.total_operations(),
            conflicts = plan.conflicts.len(),
            "Sync started"
        );

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.execute(instance, plan).await;
        });
        Ok(sync_id)
    }

    /// Drops recorded resolutions the plan has applied
    async fn consume_resolutions(&self, id: &ProfileId, plan: &SyncPlan) {
        let mut resolutions = self.resolutions.write().await;
        if let Some(recorded) = resolutions.get_mut(id) {
            for applied in plan
                .resolved
                .iter()
                .filter(|r| r.source == ResolutionSource::Caller)
            {
                recorded.remove(&applied.path);
            }
            if recorded.is_empty() {
                resolutions.remove(id);
            }
        }
    }

    /// Drives `plan` to a terminal state and files the outcome
    ///
    /// The executor runs in its own task so a panic inside it (a user
    /// callback, for instance) still ends the run in `Failed`.
    async fn execute(&self, instance: Arc<SyncInstance>, plan: SyncPlan) {
        let hooks = {
            let callbacks = self.callbacks.read().await;
            ExecutionHooks {
                progress: callbacks.progress.clone(),
                error: callbacks.error.clone(),
            }
        };
        let executor = PlanExecutor::new(
            Arc::clone(&self.fs),
            Arc::clone(&self.store),
            Arc::clone(&self.backups),
        )
        .with_hooks(hooks)
        .with_retry_base_delay(self.options.retry_base_delay);

        let run = {
            let instance = Arc::clone(&instance);
            tokio::spawn(async move { executor.execute(&instance, &plan).await })
        };
        let state = match run.await {
            Ok(state) => state,
            Err(e) => Self::abort_run(&instance, &e).await,
        };
        let report = instance.report().await;

        {
            let mut counters = self.counters.write().await;
            counters.total_syncs += 1;
            counters.bytes_uploaded += report.bytes_uploaded;
            counters.bytes_downloaded += report.bytes_downloaded;
            if report.success {
                counters.successful_syncs += 1;
            } else {
                counters.failed_syncs += 1;
            }
        }
        self.reports.write().await.insert(instance.id(), report);

        if let Err(e) = instance.transition(state) {
            warn!(sync_id = %instance.id(), error = %e, "Could not record terminal state");
        }
    }

    /// Seals the report of a run whose executor task died
    async fn abort_run(instance: &SyncInstance, e: &JoinError) -> InstanceState {
        let message = format!("Sync task failed: {e}");
        error!(sync_id = %instance.id(), error = %e, "Sync task did not finish");

        let progress = instance.progress().await;
        let remaining = progress
            .total_operations
            .saturating_sub(progress.completed_operations);
        let state = InstanceState::Failed(message.clone());
        instance
            .update_report(|r| {
                r.files_skipped += remaining;
                r.errors.push(message);
                r.finish(state.clone());
            })
            .await;
        state
    }

    async fn instance(&self, id: &SyncId) -> Option<Arc<SyncInstance>> {
        self.instances.read().await.get(id).cloned()
    }

    async fn require_instance(&self, id: &SyncId) -> Result<Arc<SyncInstance>> {
        self.instance(id).await.ok_or(SyncError::SyncNotFound(*id))
    }

    fn ensure_running(instance: &SyncInstance, target: &str) -> Result<()> {
        let state = instance.state();
        if state.is_finished() {
            return Err(DomainError::InvalidState {
                from: state.to_string(),
                to: target.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Pauses run `id` before its next action
    pub async fn pause_sync(&self, id: &SyncId) -> Result<()> {
        let instance = self.require_instance(id).await?;
        Self::ensure_running(&instance, "paused")?;
        instance.pause();
        Ok(())
    }

    pub async fn resume_sync(&self, id: &SyncId) -> Result<()> {
        let instance = self.require_instance(id).await?;
        Self::ensure_running(&instance, "syncing")?;
        instance.resume();
        Ok(())
    }

    /// Cancels run `id`; it stops before its next action
    pub async fn stop_sync(&self, id: &SyncId) -> Result<()> {
        let instance = self.require_instance(id).await?;
        instance.cancel();
        Ok(())
    }

    /// Waits until run `id` reaches a terminal state
    pub async fn wait_for_sync(&self, id: &SyncId) -> Result<InstanceState> {
        if let Some(instance) = self.instance(id).await {
            return Ok(instance.wait_finished().await);
        }
        self.reports
            .read()
            .await
            .get(id)
            .map(|r| r.final_state.clone())
            .ok_or(SyncError::SyncNotFound(*id))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub async fn get_sync_progress(&self, id: &SyncId) -> Result<SyncProgress> {
        Ok(self.require_instance(id).await?.progress().await)
    }

    pub async fn get_sync_state(&self, id: &SyncId) -> Result<InstanceState> {
        if let Some(instance) = self.instance(id).await {
            return Ok(instance.state());
        }
        self.reports
            .read()
            .await
            .get(id)
            .map(|r| r.final_state.clone())
            .ok_or(SyncError::SyncNotFound(*id))
    }

    /// Runs currently syncing or paused
    pub async fn get_active_syncs(&self) -> Vec<SyncId> {
        self.instances
            .read()
            .await
            .values()
            .filter(|i| i.state().is_active())
            .map(|i| i.id())
            .collect()
    }

    /// Report of run `id`
    ///
    /// Once the run has finished its instance is dropped; the report stays
    /// until cleared. A running instance yields its partial report.
    pub async fn get_sync_report(&self, id: &SyncId) -> Result<SyncReport> {
        let stored = self.reports.read().await.get(id).cloned();
        let instance = self.instance(id).await;

        let report = match (stored, &instance) {
            (Some(report), _) => report,
            (None, Some(instance)) => instance.report().await,
            (None, None) => return Err(SyncError::SyncNotFound(*id)),
        };

        if instance.is_some_and(|i| i.state().is_finished()) {
            self.instances.write().await.remove(id);
        }
        Ok(report)
    }

    pub async fn clear_sync_report(&self, id: &SyncId) -> bool {
        self.reports.write().await.remove(id).is_some()
    }

    pub async fn clear_sync_reports(&self) {
        self.reports.write().await.clear();
    }

    /// Drops the oldest finished instances beyond the configured limit
    ///
    /// Their reports stay in the report registry.
    pub async fn prune_finished_instances(&self) -> usize {
        let mut instances = self.instances.write().await;
        let mut finished: Vec<(DateTime<Utc>, SyncId)> = instances
            .values()
            .filter(|i| i.state().is_finished())
            .map(|i| (i.started_at(), i.id()))
            .collect();
        let excess = finished
            .len()
            .saturating_sub(self.options.max_finished_instances);
        if excess == 0 {
            return 0;
        }
        finished.sort();
        for (_, id) in finished.iter().take(excess) {
            instances.remove(id);
        }
        debug!(pruned = excess, "Finished instances pruned");
        excess
    }

    // ========================================================================
    // Conflicts and diffs
    // ========================================================================

    /// Genuine conflicts between the two trees of `config`
    pub async fn detect_conflicts(&self, config: &SyncConfig) -> Result<Vec<SyncConflict>> {
        let diff = self.diff.calculate(config).await?;
        Ok(ConflictDetector::detect(
            diff.comparisons.values(),
            config.direction,
        ))
    }

    /// Records `resolution` for `path`; applied by the next analysis of the
    /// profile and consumed by the next run
    pub async fn resolve_conflict(
        &self,
        profile_id: &ProfileId,
        path: &str,
        resolution: ConflictResolution,
    ) -> Result<()> {
        if !self.profiles.read().await.contains_key(profile_id) {
            return Err(SyncError::ProfileNotFound(*profile_id));
        }
        self.resolutions
            .write()
            .await
            .entry(*profile_id)
            .or_default()
            .insert(path.to_string(), resolution);
        info!(
            profile_id = %profile_id,
            path,
            resolution = %resolution,
            "Conflict resolution recorded"
        );
        Ok(())
    }

    /// Compares one local file with one remote file
    pub async fn compare_files(&self, local: &Path, remote_path: &str) -> Result<FileComparison> {
        let state = self.fs.get_state(local).await?;
        let local_meta = state.is_regular_file().then(|| SideMetadata {
            size: state.size,
            modified: state.modified,
            checksum: None,
        });
        let remote_meta = find_remote_file(self.store.as_ref(), remote_path, false)
            .await
            .map_err(|e| SyncError::Connectivity(format!("{e:#}")))?
            .map(|entry| SideMetadata {
                size: entry.size,
                modified: entry.modified,
                checksum: entry.checksum.filter(|c| !c.is_empty()),
            });

        let name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| remote_path.to_string());
        Ok(FileComparison::compute(
            name,
            local_meta.as_ref(),
            remote_meta.as_ref(),
        ))
    }

    /// Compares two trees with default filter settings
    pub async fn calculate_differences(&self, local: &Path, remote: &str) -> Result<TreeDiff> {
        let config = SyncConfig::new("differences", local, remote, SyncDirection::Bidirectional);
        self.diff.calculate(&config).await
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    async fn modify_profile(
        &self,
        id: &ProfileId,
        f: impl FnOnce(&mut SyncConfig),
    ) -> Result<SyncConfig> {
        let config = {
            let mut profiles = self.profiles.write().await;
            let profile = profiles.get_mut(id).ok_or(SyncError::ProfileNotFound(*id))?;
            let mut config = profile.config().clone();
            f(&mut config);
            Self::validate_config(&config)?;
            profile.update(config.clone());
            config
        };
        self.refresh_schedule(*id, &config).await;
        Ok(config)
    }

    /// Runs profile `id` every `interval`
    pub async fn enable_auto_sync(&self, id: &ProfileId, interval: Duration) -> Result<()> {
        self.modify_profile(id, |c| {
            c.auto_sync = true;
            c.sync_interval_secs = interval.as_secs().max(1);
        })
        .await?;
        info!(profile_id = %id, interval_secs = interval.as_secs(), "Auto-sync enabled");
        Ok(())
    }

    pub async fn disable_auto_sync(&self, id: &ProfileId) -> Result<()> {
        self.modify_profile(id, |c| c.auto_sync = false).await?;
        info!(profile_id = %id, "Auto-sync disabled");
        Ok(())
    }

    /// Runs profile `id` once at `at`
    pub async fn schedule_sync(&self, id: &ProfileId, at: DateTime<Utc>) -> Result<()> {
        self.modify_profile(id, |c| c.scheduled_times.push(at)).await?;
        info!(profile_id = %id, at = %at, "Sync scheduled");
        Ok(())
    }

    pub async fn scheduled_syncs(&self) -> Vec<ScheduledSync> {
        self.schedules.read().await.clone()
    }

    /// Starts every profile whose schedule is due at `now`
    ///
    /// A profile with a run still active is skipped and stays due.
    pub async fn run_due_syncs(self: &Arc<Self>, now: DateTime<Utc>) -> Vec<SyncId> {
        let mut due: Vec<ProfileId> = self
            .schedules
            .read()
            .await
            .iter()
            .filter(|s| s.is_due(now))
            .map(|s| *s.profile_id())
            .collect();
        due.sort();
        due.dedup();

        let mut started = Vec::new();
        for profile_id in due {
            let busy = self
                .instances
                .read()
                .await
                .values()
                .any(|i| i.profile_id() == Some(profile_id) && !i.state().is_finished());
            if busy {
                debug!(profile_id = %profile_id, "Scheduled sync skipped, profile still running");
                continue;
            }

            let ok = match self.start_sync(&profile_id).await {
                Ok(sync_id) => {
                    info!(profile_id = %profile_id, sync_id = %sync_id, "Scheduled sync started");
                    started.push(sync_id);
                    true
                }
                Err(e) => {
                    warn!(profile_id = %profile_id, error = %e, "Scheduled sync failed to start");
                    false
                }
            };

            let mut schedules = self.schedules.write().await;
            for entry in schedules
                .iter_mut()
                .filter(|s| *s.profile_id() == profile_id && s.is_due(now))
            {
                entry.mark_fired(now, ok);
            }
        }
        started
    }

    // ========================================================================
    // Backups
    // ========================================================================

    pub async fn create_backup(&self, path: &Path) -> Result<BackupId> {
        Ok(self.backups.create_backup(path).await?.backup_id)
    }

    pub async fn restore_backup(&self, id: &BackupId) -> Result<()> {
        self.backups.restore_backup(id).await
    }

    pub async fn list_backups(&self) -> Vec<BackupInfo> {
        self.backups.list_backups().await
    }

    pub async fn cleanup_old_backups(&self, path: &Path, max_versions: u32) -> usize {
        self.backups.cleanup_old_backups(path, max_versions).await
    }

    // ========================================================================
    // Callbacks
    // ========================================================================

    /// Callback consulted for `ask_user` conflicts
    pub async fn set_conflict_resolver(&self, callback: Option<ConflictDecider>) {
        self.callbacks.write().await.ask_user = callback;
    }

    /// Callback consulted for `custom` conflicts
    pub async fn set_custom_resolver(&self, callback: Option<ConflictDecider>) {
        self.callbacks.write().await.custom = callback;
    }

    pub async fn set_progress_callback(&self, callback: Option<ProgressCallback>) {
        self.callbacks.write().await.progress = callback;
    }

    pub async fn set_error_callback(&self, callback: Option<ErrorCallback>) {
        self.callbacks.write().await.error = callback;
    }

    // ========================================================================
    // Statistics and profile documents
    // ========================================================================

    pub async fn get_statistics(&self) -> SyncStatistics {
        let mut stats = {
            let c = self.counters.read().await;
            SyncStatistics {
                total_bytes_uploaded: c.bytes_uploaded,
                total_bytes_downloaded: c.bytes_downloaded,
                total_syncs: c.total_syncs,
                successful_syncs: c.successful_syncs,
                failed_syncs: c.failed_syncs,
                ..SyncStatistics::default()
            }
        };
        stats.uptime_secs = self.started.elapsed().as_secs();
        stats.active_profiles = self.profiles.read().await.len() as u64;
        stats.active_syncs = self.get_active_syncs().await.len() as u64;
        stats.scheduled_syncs = self
            .schedules
            .read()
            .await
            .iter()
            .filter(|s| s.is_enabled())
            .count() as u64;
        stats
    }

    /// Pretty JSON document of profile `id`'s config
    ///
    /// A custom filter predicate cannot be serialized and is left out.
    pub async fn export_profile(&self, id: &ProfileId) -> Result<String> {
        let config = self.profile_config(id).await?;
        serde_json::to_string_pretty(&config)
            .map_err(|e| SyncError::Other(anyhow::anyhow!("Failed to export profile: {e}")))
    }

    /// Registers a profile from a document produced by [`export_profile`](Self::export_profile)
    pub async fn import_profile(&self, json: &str) -> Result<ProfileId> {
        let config: SyncConfig = serde_json::from_str(json)
            .map_err(|e| SyncError::Configuration(format!("Invalid profile document: {e}")))?;
        self.create_sync_profile(config).await
    }

    /// Health check of profile `id`; an empty list means no issue was found
    pub async fn verify_sync_integrity(&self, id: &ProfileId) -> Result<Vec<String>> {
        let config = self.profile_config(id).await?;
        let mut issues = Vec::new();

        let local_ok = self.fs.get_state(&config.local_path).await?.is_directory();
        if !local_ok {
            issues.push("Local path does not exist".to_string());
        }
        let remote_ok = matches!(self.store.resolve(&config.remote_path).await, Ok(Some(_)));
        if !remote_ok {
            issues.push("Remote path does not exist".to_string());
        }
        if !(local_ok && remote_ok) {
            return Ok(issues);
        }

        let diff = self.diff.calculate(&config).await?;
        let conflicts = ConflictDetector::detect(diff.comparisons.values(), config.direction);
        if !conflicts.is_empty() {
            issues.push(format!("{} unresolved conflicts", conflicts.len()));
        }

        let suspicious = diff
            .comparisons
            .values()
            .filter(|c| c.exists_local && c.exists_remote && c.local_size != c.remote_size)
            .filter(|c| match (c.local_modified, c.remote_modified) {
                (Some(l), Some(r)) => l.timestamp() == r.timestamp(),
                _ => false,
            })
            .count();
        if suspicious > 0 {
            issues.push(format!(
                "{suspicious} files differ in size but share a modification time (possible corruption)"
            ));
        }

        Ok(issues)
    }

    /// Creates every missing folder along the remote `path`
    pub async fn ensure_remote_path(&self, path: &str) -> Result<RemoteHandle> {
        ensure_remote_path(self.store.as_ref(), path)
            .await
            .map_err(|e| SyncError::Connectivity(format!("{e:#}")))
    }
}
