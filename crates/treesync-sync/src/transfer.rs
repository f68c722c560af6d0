//! Per-handle transfer state tracking
//!
//! The remote store reports each transfer's lifecycle through
//! [`ITransferListener`]. [`TransferTracker`] keeps one `watch` channel per
//! [`TransferHandle`] so the executor can await the terminal event of the
//! transfer it started, even if the store emitted it before `start_*`
//! returned the handle.

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use treesync_core::domain::TransferHandle;
use treesync_core::ports::{ITransferListener, TransferEvent};

/// Last known state of one transfer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TransferState {
    /// Handle known, no event received yet
    #[default]
    Pending,
    Active {
        name: String,
        transferred: u64,
        total: u64,
    },
    /// The store hit a temporary error and keeps going
    Retrying { last_error: String },
    Finished {
        success: bool,
        error: Option<String>,
        bytes: u64,
    },
}

impl TransferState {
    pub fn is_finished(&self) -> bool {
        matches!(self, TransferState::Finished { .. })
    }
}

/// Terminal result of a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    pub success: bool,
    pub error: Option<String>,
    pub bytes: u64,
}

/// Routes store events to per-handle watch channels
#[derive(Debug, Default)]
pub struct TransferTracker {
    transfers: DashMap<TransferHandle, watch::Sender<TransferState>>,
}

impl TransferTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn subscribe(&self, handle: TransferHandle) -> watch::Receiver<TransferState> {
        self.transfers
            .entry(handle)
            .or_insert_with(|| watch::channel(TransferState::Pending).0)
            .subscribe()
    }

    /// Current state of `handle`, if it is tracked
    pub fn state(&self, handle: TransferHandle) -> Option<TransferState> {
        self.transfers.get(&handle).map(|tx| tx.borrow().clone())
    }

    /// Number of transfers still being tracked
    pub fn tracked(&self) -> usize {
        self.transfers.len()
    }

    /// Waits for the terminal event of `handle` and stops tracking it
    pub async fn wait(&self, handle: TransferHandle) -> TransferOutcome {
        let mut rx = self.subscribe(handle);
        let finished = rx
            .wait_for(TransferState::is_finished)
            .await
            .map(|state| (*state).clone());
        let outcome = match finished {
            Ok(TransferState::Finished {
                success,
                error,
                bytes,
            }) => TransferOutcome {
                success,
                error,
                bytes,
            },
            _ => TransferOutcome {
                success: false,
                error: Some("transfer tracking closed".to_string()),
                bytes: 0,
            },
        };
        self.transfers.remove(&handle);
        outcome
    }
}

impl ITransferListener for TransferTracker {
    fn on_event(&self, event: TransferEvent) {
        let handle = event.handle();
        let entry = self
            .transfers
            .entry(handle)
            .or_insert_with(|| watch::channel(TransferState::Pending).0);

        let next = match event {
            TransferEvent::Started { name, .. } => {
                debug!(handle = %handle, name = %name, "Transfer started");
                TransferState::Active {
                    name,
                    transferred: 0,
                    total: 0,
                }
            }
            TransferEvent::Progress {
                transferred, total, ..
            } => {
                trace!(handle = %handle, transferred, total, "Transfer progress");
                let name = match &*entry.borrow() {
                    TransferState::Active { name, .. } => name.clone(),
                    TransferState::Finished { .. } => return,
                    _ => String::new(),
                };
                TransferState::Active {
                    name,
                    transferred,
                    total,
                }
            }
            TransferEvent::TemporaryError { message, .. } => {
                warn!(handle = %handle, error = %message, "Transfer hit a temporary error");
                TransferState::Retrying {
                    last_error: format!("Temporary error: {message}"),
                }
            }
            TransferEvent::Finished {
                success,
                error,
                bytes_transferred,
                ..
            } => TransferState::Finished {
                success,
                error,
                bytes: bytes_transferred,
            },
        };
        entry.send_replace(next);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_finished_before_wait_is_not_lost() {
        let tracker = TransferTracker::new();
        let h = TransferHandle::new(1);
        tracker.on_event(TransferEvent::Finished {
            handle: h,
            success: true,
            error: None,
            bytes_transferred: 42,
        });
        let outcome = tracker.wait(h).await;
        assert!(outcome.success);
        assert_eq!(outcome.bytes, 42);
        assert_eq!(tracker.tracked(), 0);
    }

    #[tokio::test]
    async fn test_wait_follows_events() {
        let tracker = Arc::new(TransferTracker::new());
        let h = TransferHandle::new(7);

        let waiter = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move { tracker.wait(h).await })
        };
        tokio::task::yield_now().await;

        tracker.on_event(TransferEvent::Started {
            handle: h,
            name: "a.txt".into(),
        });
        tracker.on_event(TransferEvent::Progress {
            handle: h,
            transferred: 5,
            total: 10,
        });
        assert_eq!(
            tracker.state(h),
            Some(TransferState::Active {
                name: "a.txt".into(),
                transferred: 5,
                total: 10
            })
        );
        tracker.on_event(TransferEvent::TemporaryError {
            handle: h,
            message: "busy".into(),
        });
        assert_eq!(
            tracker.state(h),
            Some(TransferState::Retrying {
                last_error: "Temporary error: busy".into()
            })
        );
        tracker.on_event(TransferEvent::Finished {
            handle: h,
            success: false,
            error: Some("disk full".into()),
            bytes_transferred: 5,
        });

        let outcome = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("disk full"));
    }

    #[test]
    fn test_progress_after_finish_is_ignored() {
        let tracker = TransferTracker::new();
        let h = TransferHandle::new(2);
        tracker.on_event(TransferEvent::Finished {
            handle: h,
            success: true,
            error: None,
            bytes_transferred: 1,
        });
        tracker.on_event(TransferEvent::Progress {
            handle: h,
            transferred: 0,
            total: 1,
        });
        assert!(tracker.state(h).unwrap().is_finished());
    }
}
