//! Common traits for GroupGuard.
//!
//! The upstream identity provider is a pluggable capability: the validator
//! only ever talks to it through [`GroupMembershipProvider`], and concrete
//! providers are chosen when the validator is built.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{AccessToken, MembershipCheck};

// ═══════════════════════════════════════════════════════════════════════════════
// GROUP MEMBERSHIP PROVIDER TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Interface for an upstream group-membership source.
///
/// Implementations might use:
/// - An identity provider's directory API (Google, Okta, Azure AD)
/// - An in-memory directory (for testing/development)
///
/// Implementations must tolerate repeated calls for the same identity: the
/// validator calls again on every cache miss and on every cache hit.
#[async_trait]
pub trait GroupMembershipProvider: Send + Sync {
    /// Checks which of `allowed_groups` the identity belongs to.
    ///
    /// # Arguments
    /// * `email` - The identity being validated
    /// * `allowed_groups` - Groups the caller is testing against
    /// * `token` - Credential for the upstream call
    /// * `prior_membership` - Membership already known from the cache, or
    ///   empty when the caller needs a full fetch
    ///
    /// # Returns
    /// The valid groups plus the identity's full membership.
    async fn check_membership(
        &self,
        email: &str,
        allowed_groups: &[String],
        token: &AccessToken,
        prior_membership: &[String],
    ) -> Result<MembershipCheck>;

    /// Short provider name for logs and errors.
    fn name(&self) -> &str {
        "provider"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GroupsError;

    struct DenyAll;

    #[async_trait]
    impl GroupMembershipProvider for DenyAll {
        async fn check_membership(
            &self,
            _email: &str,
            _allowed_groups: &[String],
            _token: &AccessToken,
            _prior_membership: &[String],
        ) -> Result<MembershipCheck> {
            Err(GroupsError::Unauthorized("denied".into()))
        }
    }

    #[tokio::test]
    async fn test_trait_object_dispatch() {
        let provider: Box<dyn GroupMembershipProvider> = Box::new(DenyAll);
        assert_eq!(provider.name(), "provider");

        let err = provider
            .check_membership("a@example.com", &[], &AccessToken::default(), &[])
            .await
            .unwrap_err();
        assert!(err.is_upstream());
    }
}
