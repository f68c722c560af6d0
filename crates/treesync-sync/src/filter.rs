//! Filter engine
//!
//! Decides per path whether it takes part in a sync. Rules are evaluated in
//! a fixed order and AND'ed together:
//!
//! 1. custom predicate
//! 2. hidden names (leading `.`), then OS metadata files
//! 3. temporary names (`~`, `.tmp`, `.temp`)
//! 4. size bounds, then modification-time bounds (files only)
//! 5. excluded extensions
//! 6. included extensions, when any are listed
//! 7. excluded substrings
//! 8. included substrings, when any are listed

use std::collections::HashSet;

use treesync_core::domain::{FilterCandidate, SyncFilter};

/// Well-known OS metadata file names
const SYSTEM_FILES: &[&str] = &["thumbs.db", "desktop.ini", ".ds_store"];

/// Suffixes marking temporary files
const TEMPORARY_SUFFIXES: &[&str] = &["~", ".tmp", ".temp"];

/// Evaluates a [`SyncFilter`] against candidates
#[derive(Debug, Clone)]
pub struct FilterEngine {
    filter: SyncFilter,
    include_extensions: HashSet<String>,
    exclude_extensions: HashSet<String>,
}

fn normalize_extensions(list: &[String]) -> HashSet<String> {
    list.iter()
        .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

impl FilterEngine {
    pub fn new(filter: &SyncFilter) -> Self {
        Self {
            include_extensions: normalize_extensions(&filter.include_extensions),
            exclude_extensions: normalize_extensions(&filter.exclude_extensions),
            filter: filter.clone(),
        }
    }

    pub fn filter(&self) -> &SyncFilter {
        &self.filter
    }

    /// Returns true if `candidate` is subject to synchronization
    pub fn should_include(&self, candidate: &FilterCandidate) -> bool {
        let f = &self.filter;
        let name = candidate.name();

        if let Some(custom) = &f.custom {
            if !custom(candidate) {
                return false;
            }
        }

        if f.exclude_hidden && name.starts_with('.') {
            return false;
        }
        if f.exclude_system && SYSTEM_FILES.contains(&name.to_ascii_lowercase().as_str()) {
            return false;
        }

        if f.exclude_temporary {
            let lower = name.to_ascii_lowercase();
            if TEMPORARY_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
                return false;
            }
        }

        if !candidate.is_dir {
            if candidate.size < f.min_file_size || candidate.size > f.max_file_size {
                return false;
            }
            if let Some(modified) = candidate.modified {
                if f.modified_after.is_some_and(|after| modified < after) {
                    return false;
                }
                if f.modified_before.is_some_and(|before| modified > before) {
                    return false;
                }
            }
        }

        let extension = candidate.extension();
        if let Some(ext) = &extension {
            if self.exclude_extensions.contains(ext) {
                return false;
            }
        }
        if !self.include_extensions.is_empty() {
            match &extension {
                Some(ext) if self.include_extensions.contains(ext) => {}
                _ => return false,
            }
        }

        let path = candidate.relative_path.as_str();
        if f.exclude_patterns.iter().any(|p| path.contains(p.as_str())) {
            return false;
        }
        if !f.include_patterns.is_empty()
            && !f.include_patterns.iter().any(|p| path.contains(p.as_str()))
        {
            return false;
        }

        true
    }

    /// Returns true if nothing below the directory `candidate` is considered
    ///
    /// Only the hidden-name and custom rules prune; a directory excluded by
    /// extension or pattern rules still has its children evaluated.
    pub fn prunes(&self, candidate: &FilterCandidate) -> bool {
        if !candidate.is_dir {
            return false;
        }
        if self.filter.exclude_hidden && candidate.name().starts_with('.') {
            return true;
        }
        self.filter
            .custom
            .as_ref()
            .is_some_and(|custom| !custom(candidate))
    }
}

/// One-off evaluation of `filter` for `candidate`
pub fn should_include(candidate: &FilterCandidate, filter: &SyncFilter) -> bool {
    FilterEngine::new(filter).should_include(candidate)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn file(path: &str) -> FilterCandidate {
        FilterCandidate::file(path, 100, Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap()))
    }

    #[test]
    fn test_default_filter_only_drops_temporary_files() {
        let engine = FilterEngine::new(&SyncFilter::default());
        assert!(engine.should_include(&file("docs/report.pdf")));
        assert!(engine.should_include(&file(".hidden")));
        assert!(!engine.should_include(&file("docs/report.pdf~")));
        assert!(!engine.should_include(&file("build/x.TMP")));
        assert!(!engine.should_include(&file("x.temp")));
    }

    #[test]
    fn test_include_extensions_exclude_everything_else() {
        let filter = SyncFilter {
            include_extensions: vec!["pdf".into(), ".DOCX".into()],
            include_patterns: vec!["docs".into()],
            ..SyncFilter::default()
        };
        let engine = FilterEngine::new(&filter);
        assert!(engine.should_include(&file("docs/a.pdf")));
        assert!(engine.should_include(&file("docs/b.docx")));
        assert!(!engine.should_include(&file("docs/c.txt")));
        assert!(!engine.should_include(&file("docs/Makefile")));
        assert!(!engine.should_include(&file("docs/.pdf")));
    }

    #[test]
    fn test_exclude_extension_wins_over_include() {
        let filter = SyncFilter {
            include_extensions: vec!["log".into()],
            exclude_extensions: vec!["log".into()],
            ..SyncFilter::default()
        };
        assert!(!should_include(&file("app.log"), &filter));
    }

    #[test]
    fn test_size_and_time_bounds_apply_to_files_only() {
        let filter = SyncFilter {
            min_file_size: 10,
            max_file_size: 50,
            modified_after: Some(Utc.timestamp_opt(1_800_000_000, 0).unwrap()),
            ..SyncFilter::default()
        };
        let engine = FilterEngine::new(&filter);
        assert!(!engine.should_include(&file("big.bin")));
        assert!(!engine.should_include(&FilterCandidate::file(
            "old.bin",
            20,
            Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap())
        )));
        assert!(engine.should_include(&FilterCandidate::file("unknown-time.bin", 20, None)));
        assert!(engine.should_include(&FilterCandidate::dir("folder")));
    }

    #[test]
    fn test_hidden_system_and_patterns() {
        let filter = SyncFilter {
            exclude_hidden: true,
            exclude_system: true,
            exclude_patterns: vec!["node_modules".into()],
            ..SyncFilter::default()
        };
        let engine = FilterEngine::new(&filter);
        assert!(!engine.should_include(&file("a/.env")));
        assert!(!engine.should_include(&file("photos/Thumbs.db")));
        assert!(!engine.should_include(&file("web/node_modules/x.js")));
        assert!(engine.should_include(&file("web/src/x.js")));
    }

    #[test]
    fn test_custom_predicate_runs_first_and_prunes() {
        let filter = SyncFilter::default().with_custom(|c| !c.relative_path.starts_with("private"));
        let engine = FilterEngine::new(&filter);
        assert!(!engine.should_include(&file("private/a.txt")));
        assert!(engine.prunes(&FilterCandidate::dir("private")));
        assert!(!engine.prunes(&FilterCandidate::dir("public")));
    }

    #[test]
    fn test_hidden_directories_prune_but_extension_rules_do_not() {
        let filter = SyncFilter {
            exclude_hidden: true,
            include_extensions: vec!["txt".into()],
            ..SyncFilter::default()
        };
        let engine = FilterEngine::new(&filter);
        assert!(engine.prunes(&FilterCandidate::dir(".git")));
        let docs = FilterCandidate::dir("docs");
        assert!(!engine.should_include(&docs));
        assert!(!engine.prunes(&docs));
    }
}
