//! Upstream membership results.

use serde::{Deserialize, Serialize};

/// Result of an upstream group-membership check.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipCheck {
    /// Groups from the allowed set the identity belongs to
    pub valid_groups: Vec<String>,
    /// Every group the provider knows the identity belongs to.
    /// May be empty when the provider answered from prior membership only.
    pub membership: Vec<String>,
}

impl MembershipCheck {
    /// Creates a new membership check result.
    pub fn new(valid_groups: Vec<String>, membership: Vec<String>) -> Self {
        Self {
            valid_groups,
            membership,
        }
    }

    /// Intersects `membership` with `allowed_groups`, keeping allowed order.
    pub fn intersect(membership: Vec<String>, allowed_groups: &[String]) -> Self {
        let valid_groups = allowed_groups
            .iter()
            .filter(|group| membership.contains(*group))
            .cloned()
            .collect();

        Self {
            valid_groups,
            membership,
        }
    }

    /// Returns true if the identity belongs to at least one allowed group.
    pub fn is_member(&self) -> bool {
        !self.valid_groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_intersect_keeps_allowed_order() {
        let check = MembershipCheck::intersect(groups(&["g3", "g1", "g2"]), &groups(&["g2", "g1"]));
        assert_eq!(check.valid_groups, groups(&["g2", "g1"]));
        assert_eq!(check.membership, groups(&["g3", "g1", "g2"]));
        assert!(check.is_member());
    }

    #[test]
    fn test_intersect_no_overlap() {
        let check = MembershipCheck::intersect(groups(&["g3"]), &groups(&["g1"]));
        assert!(check.valid_groups.is_empty());
        assert!(!check.is_member());
    }
}
