//! Domain entities and value objects
//!
//! This module contains the core domain types for TreeSync:
//! - Newtypes for identifiers and remote/transfer handles
//! - Profiles, directions and filters
//! - Comparisons, conflicts and plans produced by analysis
//! - Run state, progress, reports and statistics
//! - Scheduling and backup records
//! - Domain-specific error types

pub mod backup;
pub mod comparison;
pub mod conflict;
pub mod errors;
pub mod filter;
pub mod newtypes;
pub mod plan;
pub mod profile;
pub mod progress;
pub mod report;
pub mod schedule;

// Re-export commonly used types
pub use backup::BackupInfo;
pub use comparison::{DifferenceReason, FileComparison, Side, SideMetadata};
pub use conflict::{ConflictResolution, ConflictRule, ConflictType, ResolutionSource, SyncConflict};
pub use errors::DomainError;
pub use filter::{CustomPredicate, FilterCandidate, SyncFilter};
pub use newtypes::*;
pub use plan::{AppliedResolution, ConflictCopy, PathAction, SyncPlan};
pub use profile::{SyncConfig, SyncDirection, SyncProfile};
pub use progress::{InstanceState, SyncOperation, SyncProgress};
pub use report::{SyncReport, SyncStatistics};
pub use schedule::ScheduledSync;
