//! In-memory group directory provider.
//!
//! Fast, thread-safe stand-in for a real identity provider, suitable for
//! development, testing, and deployments with a static group file.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, instrument};

use groupguard_core::error::{GroupsError, Result};
use groupguard_core::traits::GroupMembershipProvider;
use groupguard_core::types::{AccessToken, MembershipCheck};

/// Static email → groups directory.
///
/// Emails are matched case-insensitively. Unknown users simply have no
/// groups; that is not an error.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    members: DashMap<String, Vec<String>>,
    /// Number of directory lookups (full fetches) served
    lookups: AtomicU64,
}

impl StaticDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a directory from an email → groups map.
    pub fn from_map(members: HashMap<String, Vec<String>>) -> Self {
        let directory = Self::new();
        for (email, groups) in members {
            directory.insert(&email, groups);
        }
        directory
    }

    /// Parses a JSON object of the form `{"email": ["group", ...]}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let members: HashMap<String, Vec<String>> = serde_json::from_str(json)
            .map_err(|e| GroupsError::Config(format!("invalid group directory: {e}")))?;
        Ok(Self::from_map(members))
    }

    fn normalize(email: &str) -> String {
        email.trim().to_lowercase()
    }

    /// Sets the groups of `email`, replacing any previous membership.
    pub fn insert(&self, email: &str, groups: Vec<String>) {
        self.members.insert(Self::normalize(email), groups);
    }

    /// Removes `email` from the directory.
    pub fn remove(&self, email: &str) {
        self.members.remove(&Self::normalize(email));
    }

    /// Returns the number of full membership lookups served so far.
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Returns every (normalized) email in the directory, sorted.
    pub fn emails(&self) -> Vec<String> {
        let mut emails: Vec<String> = self.members.iter().map(|m| m.key().clone()).collect();
        emails.sort();
        emails
    }

    /// Returns the number of users in the directory.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns true if the directory has no users.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[async_trait]
impl GroupMembershipProvider for StaticDirectory {
    /// Answers from `prior_membership` when it is known, otherwise looks the
    /// user up in the directory.
    #[instrument(skip(self, _token, prior_membership), fields(prior = prior_membership.len()))]
    async fn check_membership(
        &self,
        email: &str,
        allowed_groups: &[String],
        _token: &AccessToken,
        prior_membership: &[String],
    ) -> Result<MembershipCheck> {
        if !prior_membership.is_empty() {
            return Ok(MembershipCheck::intersect(
                prior_membership.to_vec(),
                allowed_groups,
            ));
        }

        self.lookups.fetch_add(1, Ordering::Relaxed);
        let membership = self
            .members
            .get(&Self::normalize(email))
            .map(|groups| groups.value().clone())
            .unwrap_or_default();

        debug!(email, groups = membership.len(), "Directory lookup");
        Ok(MembershipCheck::intersect(membership, allowed_groups))
    }

    fn name(&self) -> &str {
        "static"
    }
}
