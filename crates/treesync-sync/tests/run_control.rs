//! Pause, resume, cancel and report bookkeeping of running syncs
//!
//! Transfers are throttled so each file takes about 100 ms, which leaves
//! room to act between actions.

mod common;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{write, Fixture};
use treesync_core::domain::{InstanceState, SyncConfig, SyncDirection, SyncId, SyncProgress};
use treesync_core::ports::{ErrorCallback, ProgressCallback};
use treesync_sync::{SyncError, SyncManager};

const FILES: usize = 5;

fn throttled(fx: &Fixture) -> SyncConfig {
    for i in 0..FILES {
        write(&fx.local(), &format!("file{i}.bin"), &[b'x'; 1000]);
    }
    let mut config = fx.config(SyncDirection::LocalToRemote);
    config.chunk_size = 100;
    config.bandwidth_limit = 10_000;
    config.create_backups = false;
    config
}

async fn wait_until_completed(manager: &SyncManager, id: &SyncId, operations: u64) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if manager.get_sync_progress(id).await.unwrap().completed_operations >= operations {
            return;
        }
        assert!(tokio::time::Instant::now() < deadline, "run made no progress");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pause_holds_progress_until_resume() {
    let fx = Fixture::new();
    let config = throttled(&fx);
    let id = fx.manager.create_sync_profile(config).await.unwrap();

    let sync_id = fx.manager.start_sync(&id).await.unwrap();
    assert_eq!(fx.manager.get_active_syncs().await, vec![sync_id]);

    wait_until_completed(&fx.manager, &sync_id, 1).await;
    fx.manager.pause_sync(&sync_id).await.unwrap();

    // Let the in-flight transfer drain, then nothing more may happen
    tokio::time::sleep(Duration::from_millis(300)).await;
    let held = fx.manager.get_sync_progress(&sync_id).await.unwrap();
    assert_eq!(
        fx.manager.get_sync_state(&sync_id).await.unwrap(),
        InstanceState::Paused
    );
    tokio::time::sleep(Duration::from_millis(300)).await;
    let still = fx.manager.get_sync_progress(&sync_id).await.unwrap();
    assert_eq!(held.completed_operations, still.completed_operations);
    assert!(still.completed_operations < FILES as u64);

    fx.manager.resume_sync(&sync_id).await.unwrap();
    assert_eq!(
        fx.manager.wait_for_sync(&sync_id).await.unwrap(),
        InstanceState::Completed
    );

    let report = fx.manager.get_sync_report(&sync_id).await.unwrap();
    assert!(report.success);
    assert_eq!(report.files_uploaded, FILES as u64);

    // A finished run can no longer be paused
    assert!(fx.manager.pause_sync(&sync_id).await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_mid_run_leaves_partial_report() {
    let fx = Fixture::new();
    let config = throttled(&fx);
    let id = fx.manager.create_sync_profile(config).await.unwrap();

    let sync_id = fx.manager.start_sync(&id).await.unwrap();
    wait_until_completed(&fx.manager, &sync_id, 2).await;
    fx.manager.stop_sync(&sync_id).await.unwrap();
    fx.manager.stop_sync(&sync_id).await.unwrap();

    let state = fx.manager.wait_for_sync(&sync_id).await.unwrap();
    assert_ne!(state, InstanceState::Completed);
    assert_eq!(state, InstanceState::Cancelled);

    let progress = fx.manager.get_sync_progress(&sync_id).await.unwrap();
    assert!(progress.completed_operations <= progress.total_operations);
    assert_eq!(progress.total_operations, FILES as u64);

    let report = fx.manager.get_sync_report(&sync_id).await.unwrap();
    assert!(!report.success);
    assert_eq!(report.final_state, InstanceState::Cancelled);
    assert!(report.files_uploaded >= 2);
    assert!(report.files_uploaded < FILES as u64);
    assert_eq!(report.files_uploaded + report.files_skipped, FILES as u64);

    let stats = fx.manager.get_statistics().await;
    assert_eq!(stats.total_syncs, 1);
    assert_eq!(stats.failed_syncs, 1);
    assert!(stats.active_syncs == 0);
}

#[tokio::test]
async fn test_progress_and_error_callbacks() {
    let fx = Fixture::new();
    write(&fx.local(), "ok.txt", b"fine");

    let calls = Arc::new(AtomicU64::new(0));
    let on_progress: ProgressCallback = {
        let calls = Arc::clone(&calls);
        Arc::new(move |p: &SyncProgress| {
            assert!(p.completed_operations + p.failed_operations <= p.total_operations);
            calls.fetch_add(1, Ordering::SeqCst);
        })
    };
    let errors = Arc::new(std::sync::Mutex::new(Vec::new()));
    let on_error: ErrorCallback = {
        let errors = Arc::clone(&errors);
        Arc::new(move |_: &SyncId, message: &str| {
            errors.lock().unwrap().push(message.to_string());
        })
    };
    fx.manager.set_progress_callback(Some(on_progress)).await;
    fx.manager.set_error_callback(Some(on_error)).await;

    let mut config = fx.config(SyncDirection::LocalToRemote);
    config.create_backups = false;
    config.max_retries = 1;
    let sync_id = fx.manager.start_custom_sync(config.clone()).await.unwrap();
    fx.manager.wait_for_sync(&sync_id).await.unwrap();
    assert!(calls.load(Ordering::SeqCst) >= 1);
    assert!(errors.lock().unwrap().is_empty());

    // A missing local root is refused before any run exists
    config.local_path = fx.tmp.path().join("missing");
    let err = fx.manager.start_custom_sync(config).await.unwrap_err();
    assert!(matches!(err, SyncError::Configuration(_)));
    assert_eq!(errors.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_report_registry_lifecycle() {
    let fx = Fixture::new();
    let mut config = fx.config(SyncDirection::Bidirectional);
    config.create_backups = false;

    let first = fx.manager.start_custom_sync(config.clone()).await.unwrap();
    fx.manager.wait_for_sync(&first).await.unwrap();
    let second = fx.manager.start_custom_sync(config).await.unwrap();
    fx.manager.wait_for_sync(&second).await.unwrap();

    // Reading the report drops the finished instance; the report stays
    assert!(fx.manager.get_sync_report(&first).await.unwrap().success);
    assert!(fx.manager.get_sync_progress(&first).await.is_err());
    assert_eq!(
        fx.manager.get_sync_state(&first).await.unwrap(),
        InstanceState::Completed
    );

    assert!(fx.manager.clear_sync_report(&first).await);
    assert!(!fx.manager.clear_sync_report(&first).await);
    assert!(matches!(
        fx.manager.get_sync_report(&first).await,
        Err(SyncError::SyncNotFound(_))
    ));

    fx.manager.clear_sync_reports().await;
    assert_eq!(fx.manager.prune_finished_instances().await, 0);
    // The instance of `second` was never read, so it still answers
    assert!(fx.manager.get_sync_progress(&second).await.is_ok());
}

#[tokio::test]
async fn test_delete_profile_cancels_its_run() {
    let fx = Fixture::new();
    let config = throttled(&fx);
    let id = fx.manager.create_sync_profile(config).await.unwrap();

    let sync_id = fx.manager.start_sync(&id).await.unwrap();
    fx.manager.delete_sync_profile(&id).await.unwrap();

    let state = tokio::time::timeout(
        Duration::from_secs(10),
        fx.manager.wait_for_sync(&sync_id),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(state, InstanceState::Cancelled);
    assert!(fx.manager.list_sync_profiles().await.is_empty());
}

#[tokio::test]
async fn test_panicking_callback_fails_the_run() {
    let fx = Fixture::new();
    write(&fx.local(), "a.txt", b"one");
    write(&fx.local(), "b.txt", b"two");

    let on_progress: ProgressCallback = Arc::new(|_: &SyncProgress| panic!("callback blew up"));
    fx.manager.set_progress_callback(Some(on_progress)).await;

    let mut config = fx.config(SyncDirection::LocalToRemote);
    config.create_backups = false;
    let sync_id = fx.manager.start_custom_sync(config).await.unwrap();

    let state = tokio::time::timeout(Duration::from_secs(5), fx.manager.wait_for_sync(&sync_id))
        .await
        .expect("run never reached a terminal state")
        .unwrap();
    assert!(matches!(state, InstanceState::Failed(_)), "got {state:?}");
    assert!(fx.manager.get_active_syncs().await.is_empty());

    let report = fx.manager.get_sync_report(&sync_id).await.unwrap();
    assert!(!report.success);
    assert!(matches!(report.final_state, InstanceState::Failed(_)));
    assert!(report.errors.iter().any(|e| e.starts_with("Sync task failed")));
    // The first upload went through before its progress callback
    assert_eq!(report.files_uploaded, 1);
    assert_eq!(report.files_skipped, 1);

    let stats = fx.manager.get_statistics().await;
    assert_eq!(stats.total_syncs, 1);
    assert_eq!(stats.failed_syncs, 1);
}
