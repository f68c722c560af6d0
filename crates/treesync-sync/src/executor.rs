//! Plan executor
//!
//! Applies a [`SyncPlan`] for one [`SyncInstance`] in a fixed order:
//!
//! 1. local conflict-copy renames
//! 2. folder creation
//! 3. uploads
//! 4. downloads
//! 5. file deletions
//! 6. folder deletions, deepest first
//!
//! Pause and cancel are observed before every action. A failed action is
//! retried per the profile, then recorded in the report and skipped; it
//! never aborts the run.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use tracing::{debug, info, instrument, warn};

use treesync_core::domain::{
    ConflictCopy, InstanceState, PathAction, RemoteHandle, Side, SyncConfig, SyncId, SyncOperation,
    SyncPlan, SyncProgress, SyncReport,
};
use treesync_core::ports::{
    ErrorCallback, ILocalFileSystem, IRemoteStore, ITransferListener, ProgressCallback,
    RemoteEntry, TransferOptions,
};

use crate::backup::BackupManager;
use crate::instance::SyncInstance;
use crate::retry::with_retry;
use crate::transfer::TransferTracker;
use crate::tree::{local_path_of, parent_of, remote_path_of};

// ============================================================================
// Remote path helpers
// ============================================================================

/// Creates every missing folder along `path` and returns the last handle
pub async fn ensure_remote_path(
    store: &dyn IRemoteStore,
    path: &str,
) -> anyhow::Result<RemoteHandle> {
    let mut current = store
        .resolve("/")
        .await?
        .context("Remote root is unavailable")?;
    let mut walked = String::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        walked.push('/');
        walked.push_str(segment);
        current = match store.resolve(&walked).await? {
            Some(handle) => handle,
            None => {
                debug!(path = %walked, "Creating remote folder");
                store.create_folder(segment, &current).await?
            }
        };
    }
    Ok(current)
}

/// Finds the file at the full remote `path`; `Ok(None)` if it is not there
pub(crate) async fn find_remote_file(
    store: &dyn IRemoteStore,
    path: &str,
    case_insensitive: bool,
) -> anyhow::Result<Option<RemoteEntry>> {
    let trimmed = path.trim_end_matches('/');
    let (parent_path, name) = match trimmed.rsplit_once('/') {
        Some(("", name)) => ("/", name),
        Some((parent, name)) => (parent, name),
        None => ("/", trimmed),
    };
    let Some(parent) = store.resolve(parent_path).await? else {
        return Ok(None);
    };
    Ok(store.list_children(&parent).await?.into_iter().find(|e| {
        !e.is_folder
            && if case_insensitive {
                e.name.eq_ignore_ascii_case(name)
            } else {
                e.name == name
            }
    }))
}

// ============================================================================
// Actions
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Action<'a> {
    Rename(&'a ConflictCopy),
    CreateFolder(&'a PathAction),
    Upload(&'a str),
    Download(&'a str),
    DeleteFile(&'a PathAction),
    DeleteFolder(&'a PathAction),
}

impl<'a> Action<'a> {
    fn ordered(plan: &'a SyncPlan) -> Vec<Action<'a>> {
        plan.conflict_copies
            .iter()
            .map(Action::Rename)
            .chain(plan.folders_to_create.iter().map(Action::CreateFolder))
            .chain(plan.files_to_upload.iter().map(|p| Action::Upload(p)))
            .chain(plan.files_to_download.iter().map(|p| Action::Download(p)))
            .chain(plan.files_to_delete.iter().map(Action::DeleteFile))
            .chain(plan.folders_to_delete.iter().map(Action::DeleteFolder))
            .collect()
    }

    fn path(&self) -> &'a str {
        match *self {
            Action::Rename(c) => &c.path,
            Action::CreateFolder(a) | Action::DeleteFile(a) | Action::DeleteFolder(a) => &a.path,
            Action::Upload(p) | Action::Download(p) => p,
        }
    }

    fn operation(&self) -> SyncOperation {
        match self {
            Action::Rename(_) => SyncOperation::Renaming,
            Action::CreateFolder(_) => SyncOperation::CreatingFolder,
            Action::Upload(_) => SyncOperation::Uploading,
            Action::Download(_) => SyncOperation::Downloading,
            Action::DeleteFile(_) | Action::DeleteFolder(_) => SyncOperation::Deleting,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Action::Rename(_) => "Rename",
            Action::CreateFolder(_) => "Create folder",
            Action::Upload(_) => "Upload",
            Action::Download(_) => "Download",
            Action::DeleteFile(_) => "Delete",
            Action::DeleteFolder(_) => "Delete folder",
        }
    }
}

// ============================================================================
// Executor
// ============================================================================

/// Callbacks invoked while a plan runs
#[derive(Clone, Default)]
pub struct ExecutionHooks {
    pub progress: Option<ProgressCallback>,
    pub error: Option<ErrorCallback>,
}

/// Executes plans through the two ports
pub struct PlanExecutor {
    fs: Arc<dyn ILocalFileSystem>,
    store: Arc<dyn IRemoteStore>,
    backups: Arc<BackupManager>,
    tracker: Arc<TransferTracker>,
    hooks: ExecutionHooks,
    retry_base_delay: Duration,
}

impl PlanExecutor {
    pub fn new(
        fs: Arc<dyn ILocalFileSystem>,
        store: Arc<dyn IRemoteStore>,
        backups: Arc<BackupManager>,
    ) -> Self {
        Self {
            fs,
            store,
            backups,
            tracker: Arc::new(TransferTracker::new()),
            hooks: ExecutionHooks::default(),
            retry_base_delay: Duration::from_secs(1),
        }
    }

    pub fn with_hooks(mut self, hooks: ExecutionHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    fn notify_error(&self, sync_id: &SyncId, message: &str) {
        if let Some(callback) = &self.hooks.error {
            callback(sync_id, message);
        }
    }

    /// Runs `plan` on `instance`, which must be in `Syncing`
    ///
    /// Returns the terminal state. The report is sealed with it; moving the
    /// instance itself into that state is left to the caller.
    #[instrument(skip(self, instance, plan), fields(sync_id = %instance.id()))]
    pub async fn execute(&self, instance: &SyncInstance, plan: &SyncPlan) -> InstanceState {
        let config = instance.config();
        let started = Instant::now();
        let actions = Action::ordered(plan);

        instance
            .update_progress(|p| {
                *p = SyncProgress::new(
                    config.name.clone(),
                    actions.len() as u64,
                    plan.total_bytes(),
                )
            })
            .await;
        instance
            .update_report(|r| {
                r.conflicts_resolved = plan.resolved.len() as u64;
                r.conflicts_unresolved = plan.conflicts.len() as u64;
                r.files_skipped = plan.conflicts.len() as u64;
            })
            .await;

        if config.create_backups && plan.touches_local() {
            self.backup_local_root(instance).await;
        }

        info!(
            profile = %config.name,
            actions = actions.len(),
            bytes = plan.total_bytes(),
            "Executing sync plan"
        );

        let options = TransferOptions {
            chunk_size: config.chunk_size,
            bandwidth_limit: config.bandwidth_limit,
        };
        let mut executed = 0usize;
        let mut cancelled = false;

        for action in &actions {
            if !instance.checkpoint().await {
                cancelled = true;
                break;
            }
            instance
                .update_progress(|p| p.begin(action.operation(), action.path()))
                .await;

            let (succeeded, bytes) = match self.perform_with_retry(config, &options, action).await {
                Ok(bytes) => {
                    debug!(action = action.label(), path = action.path(), bytes, "Action done");
                    instance.update_report(|r| record_success(r, action, bytes)).await;
                    (true, bytes)
                }
                Err(e) => {
                    let message = format!("{} failed for {}: {e:#}", action.label(), action.path());
                    warn!(path = action.path(), error = %e, "{} failed", action.label());
                    instance
                        .update_report(|r| r.record_failure(message.clone()))
                        .await;
                    self.notify_error(&instance.id(), &message);
                    (false, 0)
                }
            };
            executed += 1;

            let snapshot = instance
                .update_progress(|p| p.finish(succeeded, bytes, started.elapsed()))
                .await;
            if let Some(callback) = &self.hooks.progress {
                callback(&snapshot);
            }
        }

        let state = if cancelled {
            InstanceState::Cancelled
        } else {
            InstanceState::Completed
        };
        let skipped = (actions.len() - executed) as u64;
        instance
            .update_report(|r| {
                r.files_skipped += skipped;
                r.finish(state.clone());
            })
            .await;
        info!(
            state = %state,
            executed,
            skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Sync plan finished"
        );
        state
    }

    async fn backup_local_root(&self, instance: &SyncInstance) {
        let config = instance.config();
        match self.backups.create_backup(&config.local_path).await {
            Ok(info) => {
                debug!(backup_id = %info.backup_id, "Pre-sync backup taken");
                self.backups
                    .cleanup_old_backups(&config.local_path, config.max_backup_versions)
                    .await;
            }
            Err(e) => {
                let message = format!(
                    "Backup failed for {}: {e}",
                    config.local_path.display()
                );
                warn!(error = %e, "Proceeding without a backup");
                instance.update_report(|r| r.errors.push(message.clone())).await;
                self.notify_error(&instance.id(), &message);
            }
        }
    }

    async fn perform_with_retry(
        &self,
        config: &SyncConfig,
        options: &TransferOptions,
        action: &Action<'_>,
    ) -> anyhow::Result<u64> {
        if config.retry_on_error && config.max_retries > 0 {
            let this = self;
            with_retry(
                action.label(),
                config.max_retries,
                self.retry_base_delay,
                move || this.perform(config, options, action),
            )
            .await
        } else {
            self.perform(config, options, action).await
        }
    }

    async fn perform(
        &self,
        config: &SyncConfig,
        options: &TransferOptions,
        action: &Action<'_>,
    ) -> anyhow::Result<u64> {
        let local_root = config.local_path.as_path();
        match *action {
            Action::Rename(copy) => {
                self.fs
                    .rename(
                        &local_path_of(local_root, &copy.path),
                        &local_path_of(local_root, &copy.copy_path),
                    )
                    .await?;
                Ok(0)
            }
            Action::CreateFolder(folder) => {
                match folder.side {
                    Side::Local => {
                        self.fs
                            .create_directories(&local_path_of(local_root, &folder.path))
                            .await?
                    }
                    Side::Remote => {
                        let path = remote_path_of(&config.remote_path, &folder.path);
                        ensure_remote_path(self.store.as_ref(), &path).await?;
                    }
                }
                Ok(0)
            }
            Action::Upload(path) => self.upload(config, options, path).await,
            Action::Download(path) => self.download(config, options, path).await,
            Action::DeleteFile(target) | Action::DeleteFolder(target) => {
                self.delete(config, target).await?;
                Ok(0)
            }
        }
    }

    async fn upload(
        &self,
        config: &SyncConfig,
        options: &TransferOptions,
        path: &str,
    ) -> anyhow::Result<u64> {
        let local = local_path_of(&config.local_path, path);
        let source = self.fs.get_state(&local).await?;
        if !source.is_regular_file() {
            bail!("Local file not found: {}", local.display());
        }

        let parent_path = remote_path_of(&config.remote_path, parent_of(path).unwrap_or(""));
        let parent = ensure_remote_path(self.store.as_ref(), &parent_path).await?;

        let listener: Arc<dyn ITransferListener> = self.tracker.clone();
        let handle = self
            .store
            .start_upload(&local, &parent, options, listener)
            .await?;
        let outcome = self.tracker.wait(handle).await;
        if !outcome.success {
            bail!("{}", outcome.error.unwrap_or_else(|| "transfer failed".to_string()));
        }
        if config.verify_transfers && outcome.bytes != source.size {
            bail!(
                "Size mismatch after upload: expected {} bytes, got {}",
                source.size,
                outcome.bytes
            );
        }
        Ok(outcome.bytes)
    }

    async fn download(
        &self,
        config: &SyncConfig,
        options: &TransferOptions,
        path: &str,
    ) -> anyhow::Result<u64> {
        let remote = remote_path_of(&config.remote_path, path);
        let entry = find_remote_file(self.store.as_ref(), &remote, config.case_insensitive)
            .await?
            .with_context(|| format!("Remote file not found: {remote}"))?;
        let local = local_path_of(&config.local_path, path);
        if let Some(parent) = local.parent() {
            self.fs.create_directories(parent).await?;
        }

        let listener: Arc<dyn ITransferListener> = self.tracker.clone();
        let handle = self
            .store
            .start_download(&entry.handle, &local, options, listener)
            .await?;
        let outcome = self.tracker.wait(handle).await;
        if !outcome.success {
            bail!("{}", outcome.error.unwrap_or_else(|| "transfer failed".to_string()));
        }

        if config.verify_transfers {
            self.verify_local_size(&local, entry.size, outcome.bytes).await?;
        }
        if config.preserve_timestamps {
            if let Some(modified) = entry.modified {
                self.fs.set_last_write_time(&local, modified).await?;
            }
        }
        Ok(outcome.bytes)
    }

    async fn verify_local_size(
        &self,
        local: &Path,
        expected: u64,
        transferred: u64,
    ) -> anyhow::Result<()> {
        let written = self.fs.get_state(local).await?.size;
        if transferred != expected || written != expected {
            bail!(
                "Size mismatch after download: expected {} bytes, got {}",
                expected,
                written
            );
        }
        Ok(())
    }

    async fn delete(&self, config: &SyncConfig, target: &PathAction) -> anyhow::Result<()> {
        match target.side {
            Side::Local => {
                self.fs
                    .remove(&local_path_of(&config.local_path, &target.path))
                    .await
            }
            Side::Remote => {
                let path = remote_path_of(&config.remote_path, &target.path);
                if let Some(handle) = self.store.resolve(&path).await? {
                    self.store.remove(&handle).await?;
                }
                Ok(())
            }
        }
    }
}

fn record_success(report: &mut SyncReport, action: &Action<'_>, bytes: u64) {
    match action {
        Action::Rename(_) => {}
        Action::CreateFolder(_) => report.folders_created += 1,
        Action::Upload(_) => {
            report.files_uploaded += 1;
            report.bytes_uploaded += bytes;
        }
        Action::Download(_) => {
            report.files_downloaded += 1;
            report.bytes_downloaded += bytes;
        }
        Action::DeleteFile(_) => report.files_deleted += 1,
        Action::DeleteFolder(_) => report.folders_deleted += 1,
    }
}
