//! Conflict naming for keep-both resolution
//!
//! Generates unique file names for conflict copies, following the pattern:
//! `filename (conflicted copy YYYY-MM-DD XXXXXXXX).ext`

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

/// Generates conflict copy names
pub struct ConflictNamer;

impl ConflictNamer {
    /// Generates a conflict copy file name for today
    ///
    /// Given "report.docx", produces something like:
    /// "report (conflicted copy 2026-02-07 a1b2c3d4).docx"
    pub fn generate(original_name: &str) -> String {
        let tag = &Uuid::new_v4().simple().to_string()[..8];
        Self::format_name(original_name, Utc::now().date_naive(), tag)
    }

    /// Deterministic form of [`generate`](Self::generate)
    pub fn format_name(original_name: &str, date: NaiveDate, tag: &str) -> String {
        let (stem, ext) = split_extension(original_name);
        format!(
            "{stem} (conflicted copy {} {tag}){ext}",
            date.format("%Y-%m-%d")
        )
    }

    /// Conflict copy for a `/`-separated relative path, kept in the same folder
    ///
    /// `exists` is asked about candidate relative paths; on a collision the
    /// name gets an incrementing suffix.
    pub fn copy_path<F>(relative_path: &str, mut exists: F) -> String
    where
        F: FnMut(&str) -> bool,
    {
        let (parent, name) = match relative_path.rsplit_once('/') {
            Some((parent, name)) => (Some(parent), name),
            None => (None, relative_path),
        };
        let join = |candidate: &str| match parent {
            Some(p) => format!("{p}/{candidate}"),
            None => candidate.to_string(),
        };

        let candidate = Self::generate(name);
        if !exists(&join(&candidate)) {
            return join(&candidate);
        }

        for i in 2..=99 {
            let (stem, ext) = split_extension(&candidate);
            let numbered = join(&format!("{stem} {i}{ext}"));
            if !exists(&numbered) {
                return numbered;
            }
        }

        join(&format!("{name}.conflict-{}", Uuid::new_v4().simple()))
    }
}

/// Splits `name` into stem and extension (with its dot)
///
/// A leading dot does not start an extension, so `.bashrc` has none.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => name.split_at(pos),
        _ => (name, ""),
    }
}
