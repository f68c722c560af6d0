//! TreeSync Daemon - Background scheduling service
//!
//! This binary loads the YAML configuration, registers every configured
//! profile with a [`SyncManager`] and then either:
//! - runs the scheduler until SIGTERM/SIGINT (default), or
//! - runs every profile once, prints the reports as JSON and exits (`--once`)
//!
//! # Architecture
//!
//! The remote side is a [`DirectoryRemoteStore`] rooted at `remote.root`.
//! The scheduler loop is controlled by a `CancellationToken` that is
//! cancelled on receipt of SIGTERM or SIGINT; runs already in flight are
//! stopped before the process exits.

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use treesync_core::{config::Config, domain::{SyncId, SyncReport}, ports::ErrorCallback};
use treesync_sync::{
    DirectoryRemoteStore, LocalFileSystemAdapter, SyncManager, SyncManagerOptions, SyncScheduler,
};

// ============================================================================
// Command line
// ============================================================================

/// TreeSync scheduling daemon
#[derive(Debug, Parser)]
#[command(name = "treesyncd", version, about)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run every profile once, print the reports and exit
    #[arg(long)]
    once: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json: bool,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(cli: &Cli, config: &Config) {
    let level = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);
    if cli.json || config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_or_default(&Config::default_path()),
    };
    Ok(config)
}

// ============================================================================
// DaemonService
// ============================================================================

/// Owns the manager and the shutdown token
struct DaemonService {
    config: Config,
    manager: Arc<SyncManager>,
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Builds the manager and registers the configured profiles
    async fn new(config: Config, shutdown: CancellationToken) -> Result<Self> {
        let problems = config.validate();
        if !problems.is_empty() {
            for problem in &problems {
                error!(field = %problem.field, message = %problem.message, "Invalid configuration");
            }
            bail!("Configuration has {} error(s)", problems.len());
        }

        std::fs::create_dir_all(&config.remote.root).with_context(|| {
            format!("Failed to create remote root {}", config.remote.root.display())
        })?;

        let manager = Arc::new(SyncManager::new(
            Arc::new(LocalFileSystemAdapter::new()),
            Arc::new(DirectoryRemoteStore::new(config.remote.root.clone())),
            SyncManagerOptions::from(&config),
        ));

        for profile in &config.profiles {
            let id = manager
                .create_sync_profile(profile.clone())
                .await
                .with_context(|| format!("Invalid profile '{}'", profile.name))?;
            info!(profile_id = %id, name = %profile.name, "Profile registered");
        }

        let on_error: ErrorCallback = Arc::new(|sync_id: &SyncId, message: &str| {
            warn!(sync_id = %sync_id, error = %message, "Sync error");
        });
        manager.set_error_callback(Some(on_error)).await;

        Ok(Self {
            config,
            manager,
            shutdown,
        })
    }

    /// Runs the scheduler until shutdown, then stops in-flight runs
    async fn run(&self) -> Result<()> {
        let scheduler = SyncScheduler::new(self.config.scheduler_poll_interval());
        info!(
            profiles = self.config.profiles.len(),
            remote_root = %self.config.remote.root.display(),
            "Scheduler running"
        );
        scheduler
            .run(Arc::clone(&self.manager), self.shutdown.clone())
            .await;

        let active = self.manager.get_active_syncs().await;
        for sync_id in &active {
            self.manager.stop_sync(sync_id).await?;
        }
        for sync_id in &active {
            let state = self.manager.wait_for_sync(sync_id).await?;
            info!(sync_id = %sync_id, state = %state, "Run stopped");
        }

        let stats = self.manager.get_statistics().await;
        info!(
            total_syncs = stats.total_syncs,
            successful = stats.successful_syncs,
            failed = stats.failed_syncs,
            "Daemon statistics"
        );
        Ok(())
    }

    /// Runs each profile once and returns the reports
    async fn run_once(&self) -> Result<Vec<SyncReport>> {
        let mut reports = Vec::new();
        for profile in self.manager.list_sync_profiles().await {
            if self.shutdown.is_cancelled() {
                break;
            }
            let sync_id = match self.manager.start_sync(profile.id()).await {
                Ok(id) => id,
                Err(e) => {
                    error!(name = %profile.name(), error = %e, "Sync could not start");
                    continue;
                }
            };

            tokio::select! {
                state = self.manager.wait_for_sync(&sync_id) => {
                    let state = state?;
                    info!(name = %profile.name(), state = %state, "Sync finished");
                }
                _ = self.shutdown.cancelled() => {
                    self.manager.stop_sync(&sync_id).await?;
                    self.manager.wait_for_sync(&sync_id).await?;
                }
            }
            reports.push(self.manager.get_sync_report(&sync_id).await?);
        }
        Ok(reports)
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGINT or SIGTERM and cancels `token`
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(&cli, &config);

    info!("TreeSync daemon starting (treesyncd)");

    let shutdown_token = CancellationToken::new();
    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token).await?;

    let result = if cli.once {
        service.run_once().await.and_then(|reports| {
            println!("{}", serde_json::to_string_pretty(&reports)?);
            Ok(())
        })
    } else {
        service.run().await
    };

    match &result {
        Ok(()) => info!("TreeSync daemon shut down gracefully"),
        Err(e) => error!(error = %e, "TreeSync daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
