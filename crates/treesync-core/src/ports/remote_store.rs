//! Remote store port (driven/secondary port)
//!
//! The remote hierarchical store is reached through a client that owns
//! connections and credentials. The engine only resolves paths, lists
//! children, creates folders, removes nodes, and starts asynchronous
//! transfers whose lifecycle is reported through [`ITransferListener`].
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because store errors are adapter-specific.
//! - Transfer events form a tagged union ([`TransferEvent`]) delivered to a
//!   single listener method rather than one callback per event kind.
//! - A store may emit events for a handle before `start_*` has returned it.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::newtypes::{RemoteHandle, TransferHandle};

// ============================================================================
// RemoteEntry
// ============================================================================

/// One child returned by [`IRemoteStore::list_children`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub name: String,
    pub handle: RemoteHandle,
    /// Size in bytes (0 for folders)
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub is_folder: bool,
    /// Content checksum when the store exposes one without a download
    pub checksum: Option<String>,
}

// ============================================================================
// TransferOptions
// ============================================================================

/// Per-transfer tuning passed through to the store client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOptions {
    /// Preferred chunk size in bytes
    pub chunk_size: u64,
    /// Bytes per second, 0 = unlimited
    pub bandwidth_limit: u64,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            chunk_size: crate::domain::profile::DEFAULT_CHUNK_SIZE,
            bandwidth_limit: 0,
        }
    }
}

// ============================================================================
// Transfer events
// ============================================================================

/// Lifecycle event of one asynchronous transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    Started {
        handle: TransferHandle,
        name: String,
    },
    Progress {
        handle: TransferHandle,
        transferred: u64,
        total: u64,
    },
    /// A recoverable error; the store keeps retrying
    TemporaryError {
        handle: TransferHandle,
        message: String,
    },
    Finished {
        handle: TransferHandle,
        success: bool,
        error: Option<String>,
        bytes_transferred: u64,
    },
}

impl TransferEvent {
    /// The transfer this event belongs to
    pub fn handle(&self) -> TransferHandle {
        match self {
            TransferEvent::Started { handle, .. }
            | TransferEvent::Progress { handle, .. }
            | TransferEvent::TemporaryError { handle, .. }
            | TransferEvent::Finished { handle, .. } => *handle,
        }
    }
}

/// Receives transfer events; called from the store's own tasks
pub trait ITransferListener: Send + Sync {
    fn on_event(&self, event: TransferEvent);
}

// ============================================================================
// IRemoteStore trait
// ============================================================================

/// Port trait for the remote hierarchical store
#[async_trait::async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Resolves a `/`-separated remote path; `Ok(None)` if nothing is there
    async fn resolve(&self, path: &str) -> anyhow::Result<Option<RemoteHandle>>;

    /// Immediate children of a folder
    async fn list_children(&self, handle: &RemoteHandle) -> anyhow::Result<Vec<RemoteEntry>>;

    /// Creates `name` inside `parent` and returns its handle
    async fn create_folder(
        &self,
        name: &str,
        parent: &RemoteHandle,
    ) -> anyhow::Result<RemoteHandle>;

    /// Starts uploading `local` into `parent` under its file name
    async fn start_upload(
        &self,
        local: &Path,
        parent: &RemoteHandle,
        options: &TransferOptions,
        listener: Arc<dyn ITransferListener>,
    ) -> anyhow::Result<TransferHandle>;

    /// Starts downloading `remote` to `local`, replacing any existing file
    async fn start_download(
        &self,
        remote: &RemoteHandle,
        local: &Path,
        options: &TransferOptions,
        listener: Arc<dyn ITransferListener>,
    ) -> anyhow::Result<TransferHandle>;

    /// Removes a node (folders recursively)
    async fn remove(&self, handle: &RemoteHandle) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_handle_accessor() {
        let h = TransferHandle::new(3);
        let events = [
            TransferEvent::Started {
                handle: h,
                name: "a".into(),
            },
            TransferEvent::Progress {
                handle: h,
                transferred: 1,
                total: 2,
            },
            TransferEvent::TemporaryError {
                handle: h,
                message: "busy".into(),
            },
            TransferEvent::Finished {
                handle: h,
                success: true,
                error: None,
                bytes_transferred: 2,
            },
        ];
        assert!(events.iter().all(|e| e.handle() == h));
    }

    #[test]
    fn test_default_transfer_options() {
        let opts = TransferOptions::default();
        assert_eq!(opts.chunk_size, 10 * 1024 * 1024);
        assert_eq!(opts.bandwidth_limit, 0);
    }
}
