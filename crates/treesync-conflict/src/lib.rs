//! TreeSync Conflict - Conflict detection and resolution
//!
//! Provides:
//! - Classification of differing paths and detection of genuine conflicts
//! - Glob-based per-path policy rules on top of a profile's default strategy
//! - Policy evaluation into a concrete upload / download / keep-both decision
//! - Conflict copy naming for keep-both resolution

pub mod detector;
pub mod error;
pub mod namer;
pub mod policy;
pub mod resolver;

pub use detector::ConflictDetector;
pub use error::ConflictError;
pub use namer::ConflictNamer;
pub use policy::{validate_rules, PolicyEngine};
pub use resolver::{ConflictResolver, Decision};
