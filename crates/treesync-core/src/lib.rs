//! TreeSync Core - Domain types, ports and configuration
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `SyncProfile`, `SyncFilter`, `FileComparison`, `SyncConflict`,
//!   `SyncPlan`, `SyncProgress`, `SyncReport`, `ScheduledSync`, `BackupInfo`
//! - **Port definitions** - Traits for adapters: `ILocalFileSystem`, `IRemoteStore`,
//!   `ITransferListener`, plus the callback signatures
//! - **Configuration** - YAML-backed engine configuration with validation
//!
//! # Architecture
//!
//! The domain module contains pure values with no I/O. Ports define the
//! trait interfaces that the sync crate's adapters implement, and the
//! engine in the sync crate orchestrates domain values through them.

pub mod config;
pub mod domain;
pub mod ports;
