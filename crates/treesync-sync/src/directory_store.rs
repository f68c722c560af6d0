//! Directory-backed remote store (secondary/driven adapter)
//!
//! Implements [`IRemoteStore`] over a local directory, for mounted network
//! shares and for tests. Handles are normalized absolute remote paths
//! (`/`, `/docs`, `/docs/a.txt`) resolved against the store root.
//!
//! ## Transfers
//!
//! ```text
//! start_upload() ──► spawn ──► Started ─► Progress* ─► Finished
//!       │
//!       └── returns TransferHandle immediately
//! ```
//!
//! Content is copied in `chunk_size` chunks into a hidden
//! `.treesync-<n>.tmp` file next to the target and renamed over it once
//! complete. A failed copy removes its temporary file. A non-zero
//! `bandwidth_limit` paces the copy. Uploads keep the source modification
//! time.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::{DateTime, Utc};
use filetime::FileTime;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, instrument, warn};

use treesync_core::domain::{RemoteHandle, TransferHandle};
use treesync_core::ports::remote_store::{
    IRemoteStore, ITransferListener, RemoteEntry, TransferEvent, TransferOptions,
};

/// Upper bound for a single read buffer
const MAX_BUFFER_SIZE: u64 = 8 * 1024 * 1024;

const TEMP_PREFIX: &str = ".treesync-";
const TEMP_SUFFIX: &str = ".tmp";

/// Name of the in-flight file of transfer `handle`
fn temp_name(handle: TransferHandle) -> String {
    format!("{TEMP_PREFIX}{}{TEMP_SUFFIX}", handle.get())
}

/// True for names produced by [`temp_name`] only
fn is_temp_name(name: &str) -> bool {
    name.strip_prefix(TEMP_PREFIX)
        .and_then(|rest| rest.strip_suffix(TEMP_SUFFIX))
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

/// Remote store rooted at a directory
#[derive(Debug)]
pub struct DirectoryRemoteStore {
    root: PathBuf,
    next_transfer: AtomicU64,
}

impl DirectoryRemoteStore {
    /// Creates a store rooted at `root`; the directory must exist before use
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            next_transfer: AtomicU64::new(1),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Normalizes a remote path into its handle form
    ///
    /// Empty and `.` segments are dropped; `..` is rejected.
    pub fn normalize(path: &str) -> anyhow::Result<String> {
        let mut parts = Vec::new();
        for segment in path.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => anyhow::bail!("Remote path escapes the store root: {path}"),
                s => parts.push(s),
            }
        }
        Ok(format!("/{}", parts.join("/")))
    }

    /// Filesystem location of a handle
    fn path_of(&self, handle: &RemoteHandle) -> anyhow::Result<PathBuf> {
        let normalized = Self::normalize(handle.as_str())?;
        Ok(self.root.join(normalized.trim_start_matches('/')))
    }

    fn child_handle(parent: &RemoteHandle, name: &str) -> RemoteHandle {
        let base = parent.as_str().trim_end_matches('/');
        RemoteHandle::new(format!("{base}/{name}"))
    }

    fn next_handle(&self) -> TransferHandle {
        TransferHandle::new(self.next_transfer.fetch_add(1, Ordering::Relaxed))
    }

    fn spawn_transfer(
        &self,
        source: PathBuf,
        target: PathBuf,
        keep_mtime: bool,
        options: TransferOptions,
        listener: Arc<dyn ITransferListener>,
    ) -> TransferHandle {
        let handle = self.next_handle();
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        tokio::spawn(async move {
            listener.on_event(TransferEvent::Started { handle, name });
            let result =
                copy_chunked(&source, &target, keep_mtime, options, handle, &listener).await;
            let event = match result {
                Ok(bytes) => TransferEvent::Finished {
                    handle,
                    success: true,
                    error: None,
                    bytes_transferred: bytes,
                },
                Err(e) => {
                    warn!(%handle, source = %source.display(), error = %e, "Transfer failed");
                    TransferEvent::Finished {
                        handle,
                        success: false,
                        error: Some(format!("{e:#}")),
                        bytes_transferred: 0,
                    }
                }
            };
            listener.on_event(event);
        });

        handle
    }
}

async fn copy_chunked(
    source: &Path,
    target: &Path,
    keep_mtime: bool,
    options: TransferOptions,
    handle: TransferHandle,
    listener: &Arc<dyn ITransferListener>,
) -> anyhow::Result<u64> {
    let metadata = tokio::fs::metadata(source)
        .await
        .with_context(|| format!("Failed to stat {}", source.display()))?;
    if !metadata.is_file() {
        anyhow::bail!("Not a file: {}", source.display());
    }
    let total = metadata.len();

    let parent = target
        .parent()
        .with_context(|| format!("No parent directory for {}", target.display()))?;
    tokio::fs::create_dir_all(parent).await?;
    let temp = parent.join(temp_name(handle));

    let copied: anyhow::Result<u64> = async {
        let mut reader = tokio::fs::File::open(source).await?;
        let mut writer = tokio::fs::File::create(&temp).await?;
        let mut buf = vec![0u8; options.chunk_size.clamp(1, MAX_BUFFER_SIZE) as usize];
        let started = Instant::now();
        let mut transferred = 0u64;

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n]).await?;
            transferred += n as u64;
            listener.on_event(TransferEvent::Progress {
                handle,
                transferred,
                total,
            });

            if options.bandwidth_limit > 0 {
                let due =
                    Duration::from_secs_f64(transferred as f64 / options.bandwidth_limit as f64);
                if let Some(wait) = due.checked_sub(started.elapsed()) {
                    tokio::time::sleep(wait).await;
                }
            }
        }
        writer.flush().await?;
        drop(writer);

        tokio::fs::rename(&temp, target)
            .await
            .with_context(|| format!("Failed to move transfer into {}", target.display()))?;
        Ok(transferred)
    }
    .await;

    let transferred = match copied {
        Ok(n) => n,
        Err(e) => {
            match tokio::fs::remove_file(&temp).await {
                Ok(()) => debug!(%handle, "Removed partial transfer"),
                Err(rm) if rm.kind() == std::io::ErrorKind::NotFound => {}
                Err(rm) => warn!(%handle, error = %rm, "Could not remove partial transfer"),
            }
            return Err(e);
        }
    };

    if keep_mtime {
        let mtime = FileTime::from_last_modification_time(&metadata);
        let target = target.to_path_buf();
        tokio::task::spawn_blocking(move || filetime::set_file_mtime(&target, mtime)).await??;
    }
    Ok(transferred)
}

#[async_trait::async_trait]
impl IRemoteStore for DirectoryRemoteStore {
    #[instrument(skip(self))]
    async fn resolve(&self, path: &str) -> anyhow::Result<Option<RemoteHandle>> {
        let handle = RemoteHandle::new(Self::normalize(path)?);
        match tokio::fs::metadata(self.path_of(&handle)?).await {
            Ok(_) => Ok(Some(handle)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self), fields(handle = %handle))]
    async fn list_children(&self, handle: &RemoteHandle) -> anyhow::Result<Vec<RemoteEntry>> {
        let dir = self.path_of(handle)?;
        let mut reader = tokio::fs::read_dir(&dir)
            .await
            .with_context(|| format!("Failed to list {handle}"))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_temp_name(&name) {
                continue;
            }
            let metadata = entry.metadata().await?;
            let is_folder = metadata.is_dir();
            entries.push(RemoteEntry {
                handle: Self::child_handle(handle, &name),
                name,
                size: if is_folder { 0 } else { metadata.len() },
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
                is_folder,
                checksum: None,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(count = entries.len(), "listed children");
        Ok(entries)
    }

    #[instrument(skip(self), fields(parent = %parent))]
    async fn create_folder(
        &self,
        name: &str,
        parent: &RemoteHandle,
    ) -> anyhow::Result<RemoteHandle> {
        let handle = Self::child_handle(parent, name);
        tokio::fs::create_dir_all(self.path_of(&handle)?).await?;
        Ok(handle)
    }

    #[instrument(skip(self, listener), fields(local = %local.display(), parent = %parent))]
    async fn start_upload(
        &self,
        local: &Path,
        parent: &RemoteHandle,
        options: &TransferOptions,
        listener: Arc<dyn ITransferListener>,
    ) -> anyhow::Result<TransferHandle> {
        let name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("No file name in {}", local.display()))?;
        let target = self.path_of(&Self::child_handle(parent, &name))?;
        let handle = self.spawn_transfer(local.to_path_buf(), target, true, *options, listener);
        debug!(%handle, "upload started");
        Ok(handle)
    }

    #[instrument(skip(self, listener), fields(remote = %remote, local = %local.display()))]
    async fn start_download(
        &self,
        remote: &RemoteHandle,
        local: &Path,
        options: &TransferOptions,
        listener: Arc<dyn ITransferListener>,
    ) -> anyhow::Result<TransferHandle> {
        let source = self.path_of(remote)?;
        let handle = self.spawn_transfer(source, local.to_path_buf(), false, *options, listener);
        debug!(%handle, "download started");
        Ok(handle)
    }

    #[instrument(skip(self), fields(handle = %handle))]
    async fn remove(&self, handle: &RemoteHandle) -> anyhow::Result<()> {
        let path = self.path_of(handle)?;
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if metadata.is_dir() {
            tokio::fs::remove_dir_all(&path).await?;
        } else {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }
}
