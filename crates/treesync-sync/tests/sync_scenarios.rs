//! End-to-end scenarios: analyze, run, re-analyze
//!
//! Each test builds a real local and remote tree under a temp dir and goes
//! through [`SyncManager`] with the directory-backed remote store.

mod common;

use std::sync::Arc;

use common::{set_mtime, write, Fixture};
use treesync_core::domain::{
    ConflictResolution, ConflictType, DifferenceReason, FilterCandidate, InstanceState, Side,
    SyncConflict, SyncDirection, SyncFilter,
};
use treesync_core::ports::ConflictDecider;
use treesync_sync::FilterEngine;

#[tokio::test]
async fn test_identical_files_are_not_different() {
    let fx = Fixture::new();
    write(&fx.local(), "same.txt", b"0123456789");
    write(&fx.remote(), "same.txt", b"0123456789");
    set_mtime(&fx.local(), "same.txt", 1_700_000_000);
    set_mtime(&fx.remote(), "same.txt", 1_700_000_000);

    let diff = fx
        .manager
        .calculate_differences(&fx.local(), "/")
        .await
        .unwrap();

    let cmp = diff.get("same.txt").unwrap();
    assert!(cmp.exists_local && cmp.exists_remote);
    assert!(!cmp.is_different);
    assert_eq!(diff.difference_count(), 0);
}

#[tokio::test]
async fn test_one_sided_files_report_their_side() {
    let fx = Fixture::new();
    write(&fx.local(), "mine.txt", b"local");
    write(&fx.remote(), "theirs.txt", b"remote");

    let diff = fx
        .manager
        .calculate_differences(&fx.local(), "/")
        .await
        .unwrap();

    let mine = diff.get("mine.txt").unwrap();
    assert!(mine.exists_local && !mine.exists_remote);
    assert!(mine.is_different);
    assert_eq!(mine.difference_reason, Some(DifferenceReason::OnlyLocal));
    assert_eq!(
        mine.difference_reason.unwrap().to_string(),
        "Only exists locally"
    );

    let theirs = diff.get("theirs.txt").unwrap();
    assert!(!theirs.exists_local && theirs.exists_remote);
    assert_eq!(
        theirs.difference_reason.unwrap().to_string(),
        "Only exists remotely"
    );
}

#[tokio::test]
async fn test_include_extensions_excludes_everything_else() {
    let filter = SyncFilter {
        include_extensions: vec!["txt".into()],
        exclude_hidden: false,
        ..SyncFilter::default()
    };
    let engine = FilterEngine::new(&filter);
    assert!(engine.should_include(&FilterCandidate::file("notes.txt", 10, None)));
    assert!(!engine.should_include(&FilterCandidate::file("photo.jpg", 10, None)));
    assert!(!engine.should_include(&FilterCandidate::file("README", 10, None)));

    let fx = Fixture::new();
    write(&fx.local(), "keep.txt", b"a");
    write(&fx.local(), "skip.md", b"b");
    let mut config = fx.config(SyncDirection::LocalToRemote);
    config.filter.include_extensions = vec!["txt".into()];
    let plan = fx.manager.analyze_config(&config).await.unwrap();
    assert_eq!(plan.files_to_upload, vec!["keep.txt"]);
}

#[tokio::test]
async fn test_local_to_remote_upload_then_empty_plan() {
    let fx = Fixture::new();
    write(&fx.local(), "a.txt", b"0123456789");
    set_mtime(&fx.local(), "a.txt", 1_700_000_000);

    let id = fx
        .manager
        .create_sync_profile(fx.config(SyncDirection::LocalToRemote))
        .await
        .unwrap();

    let plan = fx.manager.analyze_folders(&id).await.unwrap();
    assert_eq!(plan.files_to_upload, vec!["a.txt"]);
    assert!(plan.files_to_download.is_empty());
    assert!(plan.files_to_delete.is_empty());
    assert_eq!(plan.total_upload_size, 10);

    let sync_id = fx.manager.start_sync(&id).await.unwrap();
    assert_eq!(
        fx.manager.wait_for_sync(&sync_id).await.unwrap(),
        InstanceState::Completed
    );
    assert_eq!(
        std::fs::read(fx.remote().join("a.txt")).unwrap(),
        b"0123456789"
    );

    let report = fx.manager.get_sync_report(&sync_id).await.unwrap();
    assert!(report.success);
    assert_eq!(report.files_uploaded, 1);
    assert_eq!(report.bytes_uploaded, 10);

    let again = fx.manager.analyze_folders(&id).await.unwrap();
    assert!(again.is_empty(), "second plan not empty: {again:?}");
}

#[tokio::test]
async fn test_mirror_local_is_idempotent() {
    let fx = Fixture::new();
    write(&fx.local(), "docs/a.txt", b"alpha");
    write(&fx.local(), "docs/deep/b.txt", b"beta");
    write(&fx.remote(), "stale.txt", b"old");

    let id = fx
        .manager
        .create_sync_profile(fx.config(SyncDirection::MirrorLocal))
        .await
        .unwrap();

    let sync_id = fx.manager.start_sync(&id).await.unwrap();
    assert_eq!(
        fx.manager.wait_for_sync(&sync_id).await.unwrap(),
        InstanceState::Completed
    );
    assert!(fx.remote().join("docs/deep/b.txt").exists());
    assert!(!fx.remote().join("stale.txt").exists());

    let first = fx.manager.analyze_folders(&id).await.unwrap();
    let second = fx.manager.analyze_folders(&id).await.unwrap();
    assert!(first.is_empty(), "plan after mirror not empty: {first:?}");
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_mirror_remote_downloads_and_deletes_unconditionally() {
    let fx = Fixture::new();
    write(&fx.remote(), "b.txt", b"from remote");
    write(&fx.local(), "c.txt", b"local only");

    let mut config = fx.config(SyncDirection::MirrorRemote);
    config.delete_orphans = false;
    let id = fx.manager.create_sync_profile(config).await.unwrap();

    let plan = fx.manager.analyze_folders(&id).await.unwrap();
    assert_eq!(plan.files_to_download, vec!["b.txt"]);
    assert_eq!(plan.files_to_delete.len(), 1);
    assert_eq!(plan.files_to_delete[0].path, "c.txt");
    assert_eq!(plan.files_to_delete[0].side, Side::Local);
    assert!(plan.files_to_upload.is_empty());

    let sync_id = fx.manager.start_sync(&id).await.unwrap();
    assert_eq!(
        fx.manager.wait_for_sync(&sync_id).await.unwrap(),
        InstanceState::Completed
    );
    assert_eq!(
        std::fs::read(fx.local().join("b.txt")).unwrap(),
        b"from remote"
    );
    assert!(!fx.local().join("c.txt").exists());

    // The run overwrote local content, so the local root was backed up first
    let backups = fx.manager.list_backups().await;
    assert_eq!(backups.len(), 1);
    assert!(backups[0].backup_path.join("c.txt").exists());
}

#[tokio::test]
async fn test_bidirectional_conflict_resolved_then_uploaded() {
    let fx = Fixture::new();
    write(&fx.local(), "x.txt", b"local version, longer");
    write(&fx.remote(), "x.txt", b"remote");
    write(&fx.local(), "new.txt", b"only here");
    set_mtime(&fx.local(), "x.txt", 1_700_000_100);
    set_mtime(&fx.remote(), "x.txt", 1_700_000_000);

    let config = fx.config(SyncDirection::Bidirectional);
    assert_eq!(config.conflict_strategy, ConflictResolution::NewerWins);
    let id = fx.manager.create_sync_profile(config).await.unwrap();

    let plan = fx.manager.analyze_folders(&id).await.unwrap();
    assert_eq!(plan.conflicts.len(), 1);
    assert_eq!(plan.conflicts[0].path, "x.txt");
    assert_eq!(plan.conflicts[0].conflict_type, ConflictType::BothModified);
    assert_eq!(plan.conflicts[0].conflict_type.to_string(), "both_modified");
    assert!(!plan.files_to_upload.contains(&"x.txt".to_string()));
    assert!(!plan.files_to_download.contains(&"x.txt".to_string()));
    assert_eq!(plan.files_to_upload, vec!["new.txt"]);

    let config = fx.manager.get_sync_profile(&id).await.unwrap().config().clone();
    let detected = fx.manager.detect_conflicts(&config).await.unwrap();
    assert_eq!(detected.len(), 1);

    fx.manager
        .resolve_conflict(&id, "x.txt", ConflictResolution::LocalWins)
        .await
        .unwrap();
    let rebuilt = fx.manager.analyze_folders(&id).await.unwrap();
    assert!(rebuilt.conflicts.is_empty());
    assert!(rebuilt.files_to_upload.contains(&"x.txt".to_string()));
    assert!(!rebuilt.files_to_download.contains(&"x.txt".to_string()));

    let sync_id = fx.manager.start_sync(&id).await.unwrap();
    fx.manager.wait_for_sync(&sync_id).await.unwrap();
    assert_eq!(
        std::fs::read(fx.remote().join("x.txt")).unwrap(),
        b"local version, longer"
    );

    let report = fx.manager.get_sync_report(&sync_id).await.unwrap();
    assert_eq!(report.conflicts_resolved, 1);
    assert_eq!(report.conflicts_unresolved, 0);
}

#[tokio::test]
async fn test_strategy_settles_conflicts_only_when_a_sync_starts() {
    let fx = Fixture::new();
    write(&fx.local(), "x.txt", b"older local");
    write(&fx.remote(), "x.txt", b"newer remote copy");
    set_mtime(&fx.local(), "x.txt", 1_700_000_000);
    set_mtime(&fx.remote(), "x.txt", 1_700_000_500);

    let id = fx
        .manager
        .create_sync_profile(fx.config(SyncDirection::Bidirectional))
        .await
        .unwrap();

    let plan = fx.manager.analyze_folders(&id).await.unwrap();
    assert_eq!(plan.conflicts.len(), 1);
    assert!(plan.files_to_download.is_empty());
    assert!(plan.files_to_upload.is_empty());

    let sync_id = fx.manager.start_sync(&id).await.unwrap();
    assert_eq!(
        fx.manager.wait_for_sync(&sync_id).await.unwrap(),
        InstanceState::Completed
    );
    assert_eq!(
        std::fs::read(fx.local().join("x.txt")).unwrap(),
        b"newer remote copy"
    );
    let report = fx.manager.get_sync_report(&sync_id).await.unwrap();
    assert_eq!(report.files_downloaded, 1);
    assert_eq!(report.conflicts_resolved, 1);
}

#[tokio::test]
async fn test_ask_user_callback_decides_conflict() {
    let fx = Fixture::new();
    write(&fx.local(), "x.txt", b"local");
    write(&fx.remote(), "x.txt", b"remote side");

    let decide: ConflictDecider = Arc::new(|_: &SyncConflict| ConflictResolution::RemoteWins);
    fx.manager.set_conflict_resolver(Some(decide)).await;
    let mut config = fx.config(SyncDirection::Bidirectional);
    config.conflict_strategy = ConflictResolution::AskUser;
    config.create_backups = false;

    let sync_id = fx.manager.start_custom_sync(config).await.unwrap();
    assert_eq!(
        fx.manager.wait_for_sync(&sync_id).await.unwrap(),
        InstanceState::Completed
    );
    assert_eq!(std::fs::read(fx.local().join("x.txt")).unwrap(), b"remote side");
}

#[tokio::test]
async fn test_verify_integrity_counts_conflicts() {
    let fx = Fixture::new();
    write(&fx.local(), "x.txt", b"one");
    write(&fx.remote(), "x.txt", b"three");
    let id = fx
        .manager
        .create_sync_profile(fx.config(SyncDirection::Bidirectional))
        .await
        .unwrap();

    let issues = fx.manager.verify_sync_integrity(&id).await.unwrap();
    assert!(issues.contains(&"1 unresolved conflicts".to_string()));
}

#[tokio::test]
async fn test_mirror_local_is_idempotent_for_part_files() {
    let fx = Fixture::new();
    write(&fx.local(), "archive.7z.part", b"first volume");

    let id = fx
        .manager
        .create_sync_profile(fx.config(SyncDirection::MirrorLocal))
        .await
        .unwrap();
    let sync_id = fx.manager.start_sync(&id).await.unwrap();
    assert_eq!(
        fx.manager.wait_for_sync(&sync_id).await.unwrap(),
        InstanceState::Completed
    );
    assert!(fx.remote().join("archive.7z.part").exists());

    let again = fx.manager.analyze_folders(&id).await.unwrap();
    assert!(again.is_empty(), "plan after mirror not empty: {again:?}");
}
