//! Policy engine for automatic conflict resolution
//!
//! Evaluates a profile's conflict rules to determine the resolution policy
//! for a path. Rules are matched using glob patterns in first-match-wins
//! order; the profile's default strategy applies when no rule matches.

use glob::Pattern;
use tracing::{debug, trace, warn};

use treesync_core::domain::{ConflictResolution, ConflictRule, ResolutionSource};

use crate::error::ConflictError;

/// Checks that every rule carries a valid glob pattern
pub fn validate_rules(rules: &[ConflictRule]) -> Result<(), ConflictError> {
    for rule in rules {
        compile(rule)?;
    }
    Ok(())
}

fn compile(rule: &ConflictRule) -> Result<Pattern, ConflictError> {
    Pattern::new(&rule.pattern).map_err(|e| ConflictError::InvalidPattern {
        pattern: rule.pattern.clone(),
        reason: e.to_string(),
    })
}

/// Engine that evaluates conflict resolution rules
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    rules: Vec<(Pattern, ConflictResolution)>,
    default_strategy: ConflictResolution,
}

impl PolicyEngine {
    /// Creates a PolicyEngine from the default strategy and a list of rules
    ///
    /// Invalid rules are logged and skipped.
    pub fn new(default_strategy: ConflictResolution, rules: &[ConflictRule]) -> Self {
        let compiled_rules: Vec<(Pattern, ConflictResolution)> = rules
            .iter()
            .filter_map(|rule| match compile(rule) {
                Ok(pattern) => Some((pattern, rule.resolution)),
                Err(e) => {
                    warn!(
                        pattern = %rule.pattern,
                        error = %e,
                        "Skipping invalid conflict rule pattern"
                    );
                    None
                }
            })
            .collect();

        debug!(
            rules_count = compiled_rules.len(),
            default = %default_strategy,
            "PolicyEngine initialized"
        );

        Self {
            rules: compiled_rules,
            default_strategy,
        }
    }

    /// Evaluates the policy for a path relative to the sync root
    ///
    /// Returns the resolution and whether it came from a rule or the
    /// default strategy.
    pub fn evaluate(&self, relative_path: &str) -> (ConflictResolution, ResolutionSource) {
        for (pattern, resolution) in &self.rules {
            if pattern.matches(relative_path) {
                trace!(
                    path = %relative_path,
                    pattern = %pattern,
                    resolution = %resolution,
                    "Conflict rule matched"
                );
                return (*resolution, ResolutionSource::Rule);
            }
        }

        trace!(
            path = %relative_path,
            default = %self.default_strategy,
            "No conflict rule matched, using default"
        );
        (self.default_strategy, ResolutionSource::Strategy)
    }

    /// Returns the default resolution strategy
    pub fn default_strategy(&self) -> ConflictResolution {
        self.default_strategy
    }

    /// Returns the number of compiled rules
    pub fn rules_count(&self) -> usize {
        self.rules.len()
    }
}
