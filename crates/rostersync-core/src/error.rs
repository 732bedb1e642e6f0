//! Error taxonomy for reconciliation passes.
//!
//! Four classes, matching how a pass can go wrong:
//!
//! - `Config` - the desired-state input is unusable. Fatal before any mutation.
//! - `GuardTripped` - the change-volume circuit breaker fired. Fatal before
//!   any mutation in the affected entity family, and distinguishable so an
//!   operator can re-run with a higher threshold.
//! - `Remote` - a remote call failed. Fatal for account lifecycle operations,
//!   recorded-and-skipped for per-role / per-board best-effort convergence.
//! - `LookupMiss` - a referenced entity does not exist remotely. Usually
//!   "nothing to do", except for the target client itself.

use thiserror::Error;

/// Error type shared by every rostersync crate.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The desired-state input or runtime configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The change-volume guard rejected the pass.
    ///
    /// Carries enough context for the operator message: how many destructive
    /// changes were requested against how many retained accounts.
    #[error(
        "refusing to apply {changes} account changes against {keeps} retained accounts \
         (accepted threshold: {threshold}); re-run with a higher threshold to override"
    )]
    GuardTripped {
        /// `|to_disable| + |to_create|` for the rejected diff.
        changes: usize,
        /// `|current| + |to_enable|` for the rejected diff.
        keeps: usize,
        /// The configured threshold that was exceeded.
        threshold: i64,
    },

    /// A remote call failed.
    #[error("remote call failed during {context}: {message}")]
    Remote {
        /// What the engine was doing when the call failed.
        context: String,
        /// Message from the underlying client.
        message: String,
    },

    /// A referenced remote entity does not exist.
    #[error("{resource} not found: {name}")]
    LookupMiss {
        /// Kind of entity ("client", "role", "board", "user").
        resource: &'static str,
        /// Identifier that failed to resolve.
        name: String,
    },
}

impl SyncError {
    /// Build a [`SyncError::Remote`] from any displayable source error.
    pub fn remote(context: impl Into<String>, source: impl std::fmt::Display) -> Self {
        SyncError::Remote {
            context: context.into(),
            message: source.to_string(),
        }
    }

    /// Whether this error is the guard circuit breaker.
    ///
    /// The CLI maps this to a dedicated exit code so operators can tell a
    /// tripped guard apart from an infrastructure failure.
    #[must_use]
    pub fn is_guard_tripped(&self) -> bool {
        matches!(self, SyncError::GuardTripped { .. })
    }
}

/// Type alias for Results using [`SyncError`].
pub type SyncResult<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_tripped_message_names_threshold() {
        let err = SyncError::GuardTripped {
            changes: 42,
            keeps: 3,
            threshold: 10,
        };
        let msg = err.to_string();
        assert!(msg.contains("42"));
        assert!(msg.contains("threshold: 10"));
        assert!(err.is_guard_tripped());
    }

    #[test]
    fn remote_helper_keeps_context() {
        let err = SyncError::remote("role creation", "503 service unavailable");
        assert_eq!(
            err.to_string(),
            "remote call failed during role creation: 503 service unavailable"
        );
        assert!(!err.is_guard_tripped());
    }

    #[test]
    fn lookup_miss_display() {
        let err = SyncError::LookupMiss {
            resource: "client",
            name: "signaux".to_string(),
        };
        assert_eq!(err.to_string(), "client not found: signaux");
    }
}
