//! Conflict resolution
//!
//! Turns a detected conflict into a concrete decision:
//! - `LocalWins` and policies preferring the local side: upload
//! - `RemoteWins` and policies preferring the remote side: download
//! - `RenameBoth`: keep a renamed local copy and sync both versions
//!
//! Delegated policies go through the registered callbacks. `AskUser` and
//! `Custom` each have their own slot.

use tracing::{debug, info};

use treesync_core::{
    domain::{
        AppliedResolution, ConflictResolution, FileComparison, ResolutionSource, SyncConflict,
    },
    ports::ConflictDecider,
};

use crate::{error::ConflictError, policy::PolicyEngine};

/// What the plan should do with a resolved conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Overwrite the remote file with the local one
    Upload,
    /// Overwrite the local file with the remote one
    Download,
    /// Rename the local file to a conflict copy, upload it, download the remote
    RenameBoth,
}

/// Applies resolution policies to conflicts
#[derive(Clone)]
pub struct ConflictResolver {
    policy: PolicyEngine,
    ask_user: Option<ConflictDecider>,
    custom: Option<ConflictDecider>,
}

impl ConflictResolver {
    pub fn new(policy: PolicyEngine) -> Self {
        Self {
            policy,
            ask_user: None,
            custom: None,
        }
    }

    /// Sets the callback consulted for `AskUser`
    pub fn with_ask_user(mut self, decider: Option<ConflictDecider>) -> Self {
        self.ask_user = decider;
        self
    }

    /// Sets the callback consulted for `Custom`
    pub fn with_custom(mut self, decider: Option<ConflictDecider>) -> Self {
        self.custom = decider;
        self
    }

    /// Resolves one conflict
    ///
    /// `preset` is a resolution recorded by the caller ahead of the run and
    /// takes precedence over rules and the default strategy. Returns
    /// [`ConflictError::Unresolved`] when no side can be chosen.
    pub fn resolve(
        &self,
        conflict: &SyncConflict,
        preset: Option<ConflictResolution>,
    ) -> Result<(Decision, AppliedResolution), ConflictError> {
        let (mut resolution, mut source) = match preset {
            Some(r) => (r, ResolutionSource::Caller),
            None => self.policy.evaluate(&conflict.path),
        };

        if resolution.is_delegated() {
            let (decider, delegated_source) = match resolution {
                ConflictResolution::AskUser => (&self.ask_user, ResolutionSource::User),
                _ => (&self.custom, ResolutionSource::Custom),
            };
            let decider = decider.as_ref().ok_or_else(|| {
                ConflictError::unresolved(
                    &conflict.path,
                    format!("no callback registered for {resolution}"),
                )
            })?;

            let answer = decider(conflict);
            debug!(
                path = %conflict.path,
                policy = %resolution,
                answer = %answer,
                "Delegated conflict decision"
            );
            if answer.is_delegated() {
                return Err(ConflictError::unresolved(
                    &conflict.path,
                    format!("callback deferred with {answer}"),
                ));
            }
            resolution = answer;
            source = delegated_source;
        }

        let decision = Self::decide(resolution, &conflict.comparison)?;
        info!(
            path = %conflict.path,
            resolution = %resolution,
            source = %source,
            "Conflict resolved"
        );

        Ok((
            decision,
            AppliedResolution {
                path: conflict.path.clone(),
                resolution,
                source,
            },
        ))
    }

    /// Maps a concrete policy onto a decision for `comparison`
    ///
    /// Time-based policies compare at whole-second resolution. Ties and
    /// missing metadata leave the conflict unresolved.
    pub fn decide(
        resolution: ConflictResolution,
        comparison: &FileComparison,
    ) -> Result<Decision, ConflictError> {
        let path = comparison.path.as_str();
        let local_secs = comparison.local_modified.map(|t| t.timestamp());
        let remote_secs = comparison.remote_modified.map(|t| t.timestamp());

        let by_order = |local_wins: bool, remote_wins: bool, what: &str| {
            if local_wins {
                Ok(Decision::Upload)
            } else if remote_wins {
                Ok(Decision::Download)
            } else {
                Err(ConflictError::unresolved(path, what.to_string()))
            }
        };

        match resolution {
            ConflictResolution::NewerWins | ConflictResolution::OlderWins => {
                let (Some(local), Some(remote)) = (local_secs, remote_secs) else {
                    return Err(ConflictError::unresolved(path, "modification time unknown"));
                };
                if resolution == ConflictResolution::NewerWins {
                    by_order(local > remote, remote > local, "modification times are equal")
                } else {
                    by_order(local < remote, remote < local, "modification times are equal")
                }
            }
            ConflictResolution::LargerWins => by_order(
                comparison.local_size > comparison.remote_size,
                comparison.remote_size > comparison.local_size,
                "sizes are equal",
            ),
            ConflictResolution::SmallerWins => by_order(
                comparison.local_size < comparison.remote_size,
                comparison.remote_size < comparison.local_size,
                "sizes are equal",
            ),
            ConflictResolution::LocalWins => Ok(Decision::Upload),
            ConflictResolution::RemoteWins => Ok(Decision::Download),
            ConflictResolution::RenameBoth => Ok(Decision::RenameBoth),
            ConflictResolution::AskUser | ConflictResolution::Custom => Err(
                ConflictError::unresolved(path, format!("{resolution} needs a callback")),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use treesync_core::domain::{ConflictRule, SideMetadata};

    use super::*;
    use crate::detector::ConflictDetector;

    fn conflict(
        local_size: u64,
        local_secs: i64,
        remote_size: u64,
        remote_secs: i64,
    ) -> SyncConflict {
        let meta = |size, secs| SideMetadata {
            size,
            modified: Some(Utc.timestamp_opt(secs, 0).unwrap()),
            checksum: None,
        };
        let cmp = FileComparison::compute(
            "docs/x.txt",
            Some(&meta(local_size, local_secs)),
            Some(&meta(remote_size, remote_secs)),
        );
        ConflictDetector::classify(&cmp).unwrap()
    }

    fn resolver(default: ConflictResolution) -> ConflictResolver {
        ConflictResolver::new(PolicyEngine::new(default, &[]))
    }

    #[test]
    fn test_newer_wins_picks_the_genuinely_newer_side() {
        let r = resolver(ConflictResolution::NewerWins);

        let (d, applied) = r.resolve(&conflict(1, 200, 2, 100), None).unwrap();
        assert_eq!(d, Decision::Upload);
        assert_eq!(applied.source, ResolutionSource::Strategy);

        let (d, _) = r.resolve(&conflict(1, 100, 2, 200), None).unwrap();
        assert_eq!(d, Decision::Download);

        let err = r.resolve(&conflict(1, 100, 2, 100), None).unwrap_err();
        assert!(err.is_unresolved());
    }

    #[test]
    fn test_older_wins() {
        let r = resolver(ConflictResolution::OlderWins);
        let (d, _) = r.resolve(&conflict(1, 200, 2, 100), None).unwrap();
        assert_eq!(d, Decision::Download);
    }

    #[test]
    fn test_size_policies() {
        let c = conflict(10, 100, 20, 100);
        assert_eq!(
            ConflictResolver::decide(ConflictResolution::LargerWins, &c.comparison).unwrap(),
            Decision::Download
        );
        assert_eq!(
            ConflictResolver::decide(ConflictResolution::SmallerWins, &c.comparison).unwrap(),
            Decision::Upload
        );
    }

    #[test]
    fn test_fixed_side_policies() {
        let c = conflict(10, 100, 20, 200);
        assert_eq!(
            ConflictResolver::decide(ConflictResolution::LocalWins, &c.comparison).unwrap(),
            Decision::Upload
        );
        assert_eq!(
            ConflictResolver::decide(ConflictResolution::RemoteWins, &c.comparison).unwrap(),
            Decision::Download
        );
        assert_eq!(
            ConflictResolver::decide(ConflictResolution::RenameBoth, &c.comparison).unwrap(),
            Decision::RenameBoth
        );
    }

    #[test]
    fn test_preset_overrides_rules() {
        let policy = PolicyEngine::new(
            ConflictResolution::RemoteWins,
            &[ConflictRule::new("docs/*", ConflictResolution::RemoteWins)],
        );
        let r = ConflictResolver::new(policy);
        let (d, applied) = r
            .resolve(&conflict(1, 1, 2, 2), Some(ConflictResolution::LocalWins))
            .unwrap();
        assert_eq!(d, Decision::Upload);
        assert_eq!(applied.source, ResolutionSource::Caller);
        assert_eq!(applied.resolution, ConflictResolution::LocalWins);
    }

    #[test]
    fn test_ask_user_without_callback_is_unresolved() {
        let r = resolver(ConflictResolution::AskUser);
        let err = r.resolve(&conflict(1, 1, 2, 2), None).unwrap_err();
        assert!(err.to_string().contains("no callback registered for ask_user"));
    }

    #[test]
    fn test_ask_user_and_custom_use_separate_callbacks() {
        let asked = Arc::new(AtomicUsize::new(0));
        let counted = asked.clone();
        let ask: ConflictDecider = Arc::new(move |_| {
            counted.fetch_add(1, Ordering::SeqCst);
            ConflictResolution::RemoteWins
        });
        let custom: ConflictDecider = Arc::new(|_| ConflictResolution::LocalWins);

        let r = resolver(ConflictResolution::AskUser)
            .with_ask_user(Some(ask))
            .with_custom(Some(custom));
        let (d, applied) = r.resolve(&conflict(1, 1, 2, 2), None).unwrap();
        assert_eq!(d, Decision::Download);
        assert_eq!(applied.source, ResolutionSource::User);
        assert_eq!(asked.load(Ordering::SeqCst), 1);

        let (d, applied) = r
            .resolve(&conflict(1, 1, 2, 2), Some(ConflictResolution::Custom))
            .unwrap();
        assert_eq!(d, Decision::Upload);
        assert_eq!(applied.source, ResolutionSource::Custom);
        assert_eq!(asked.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_deferring_leaves_conflict_unresolved() {
        let defer: ConflictDecider = Arc::new(|_| ConflictResolution::AskUser);
        let r = resolver(ConflictResolution::Custom).with_custom(Some(defer));
        assert!(r.resolve(&conflict(1, 1, 2, 2), None).unwrap_err().is_unresolved());
    }
}
