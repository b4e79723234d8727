//! Error types for GroupGuard.
//!
//! A single error hierarchy is shared by the cache, the validator and the
//! upstream providers. Every variant carries owned strings so the type is
//! `Clone`: one upstream failure can be handed to every caller that was
//! waiting on the same in-flight fetch.

use thiserror::Error;

/// Result type alias using `GroupsError`.
pub type Result<T> = std::result::Result<T, GroupsError>;

/// Main error type for all GroupGuard operations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GroupsError {
    // ═══════════════════════════════════════════════════════════════════════════
    // UPSTREAM ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// The upstream membership call failed (network, transport, rate limit).
    #[error("Upstream provider '{provider}' failed: {reason}")]
    Upstream {
        /// Name of the provider that failed
        provider: String,
        /// What went wrong
        reason: String,
    },

    /// The upstream provider rejected the credential.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The upstream provider answered with something we could not use.
    #[error("Invalid upstream response: {0}")]
    InvalidResponse(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // CACHE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Storing an entry in the cache failed.
    #[error("Cache write failed: {0}")]
    CacheWrite(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // CONFIGURATION & INTERNAL ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal invariant violation (should never happen).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GroupsError {
    /// Builds an [`GroupsError::Upstream`] error for the named provider.
    pub fn upstream(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        GroupsError::Upstream {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this error is transient (a later call may succeed).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GroupsError::Upstream { .. })
    }

    /// Returns true if the error was produced by the upstream provider.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            GroupsError::Upstream { .. }
                | GroupsError::Unauthorized(_)
                | GroupsError::InvalidResponse(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_error_display() {
        let err = GroupsError::upstream("google", "503 Service Unavailable");
        assert!(err.to_string().contains("google"));
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_upstream_fields() {
        let GroupsError::Upstream { provider, reason } = GroupsError::upstream("google", "timeout")
        else {
            panic!("expected an upstream error");
        };
        assert_eq!(provider, "google");
        assert_eq!(reason, "timeout");
    }

    #[test_case(GroupsError::upstream("p", "timeout"), true, true ; "upstream transport")]
    #[test_case(GroupsError::Unauthorized("expired".into()), false, true ; "unauthorized")]
    #[test_case(GroupsError::InvalidResponse("bad json".into()), false, true ; "invalid response")]
    #[test_case(GroupsError::CacheWrite("no runtime".into()), false, false ; "cache write")]
    #[test_case(GroupsError::Config("ttl".into()), false, false ; "config")]
    fn test_error_classification(err: GroupsError, recoverable: bool, upstream: bool) {
        assert_eq!(err.is_recoverable(), recoverable);
        assert_eq!(err.is_upstream(), upstream);
    }

    #[test]
    fn test_clone_preserves_error() {
        let err = GroupsError::Unauthorized("token revoked".into());
        assert_eq!(err.clone(), err);
    }
}
