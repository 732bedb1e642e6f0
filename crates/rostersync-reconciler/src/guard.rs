//! Change-volume circuit breaker.
//!
//! The single protection against a corrupted or truncated roster silently
//! disabling most of the user base. Evaluated strictly before any account
//! write is issued; a tripped guard aborts the whole pass with a
//! distinguishable error the operator can override by re-running with a
//! higher threshold.

use tracing::debug;

use rostersync_core::{SyncError, SyncResult};
use rostersync_directory::types::ChangeSet;

/// Guards the account lifecycle diff against excessive destructive change.
#[derive(Debug, Clone, Copy)]
pub struct ChangeGuard {
    threshold: i64,
}

impl ChangeGuard {
    /// A threshold of zero or below means "unbounded, always accept".
    #[must_use]
    pub fn new(threshold: i64) -> Self {
        Self { threshold }
    }

    /// Accept or reject a change volume.
    ///
    /// `changes` counts creations plus disablings; `keeps` counts the
    /// retained population and is carried into the error for the operator
    /// message only.
    pub fn check(&self, changes: usize, keeps: usize) -> SyncResult<()> {
        if self.threshold > 0 && changes as i64 > self.threshold {
            return Err(SyncError::GuardTripped {
                changes,
                keeps,
                threshold: self.threshold,
            });
        }
        debug!(
            changes,
            keeps,
            threshold = self.threshold,
            "change volume accepted"
        );
        Ok(())
    }

    /// Evaluate a lifecycle [`ChangeSet`].
    pub fn check_change_set(&self, set: &ChangeSet) -> SyncResult<()> {
        self.check(set.changes(), set.keeps())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_threshold_always_accepts() {
        assert!(ChangeGuard::new(0).check(1234, 0).is_ok());
    }

    #[test]
    fn negative_threshold_always_accepts() {
        assert!(ChangeGuard::new(-1).check(usize::MAX, 0).is_ok());
    }

    #[test]
    fn under_threshold_accepts() {
        assert!(ChangeGuard::new(2).check(1, 1).is_ok());
    }

    #[test]
    fn at_threshold_accepts() {
        assert!(ChangeGuard::new(2).check(2, 0).is_ok());
    }

    #[test]
    fn over_threshold_rejects() {
        let err = ChangeGuard::new(1).check(2, 1).unwrap_err();
        match err {
            SyncError::GuardTripped {
                changes,
                keeps,
                threshold,
            } => {
                assert_eq!(changes, 2);
                assert_eq!(keeps, 1);
                assert_eq!(threshold, 1);
            }
            other => panic!("expected GuardTripped, got {other}"),
        }
    }
}
