//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the sync engine
//! depends on, but whose implementations live in adapter modules.
//!
//! ## Ports Overview
//!
//! - [`ILocalFileSystem`] - Local tree enumeration and file operations
//! - [`IRemoteStore`] - Remote tree resolution, listing and transfers
//! - [`ITransferListener`] - Per-transfer lifecycle events
//! - [`callbacks`] - Conflict, progress and error hooks

pub mod callbacks;
pub mod local_filesystem;
pub mod remote_store;

pub use callbacks::{ConflictDecider, ErrorCallback, ProgressCallback};
pub use local_filesystem::{FileSystemState, ILocalFileSystem, LocalEntry};
pub use remote_store::{
    IRemoteStore, ITransferListener, RemoteEntry, TransferEvent, TransferOptions,
};
