//! Cache entry type.

use serde::{Deserialize, Serialize};

/// One cached key/value pair: an identity and its known group memberships.
///
/// The cache owns the stored copy; readers always get a clone.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Cache key, usually the user's email address
    pub key: String,
    /// Group memberships, in the order the provider reported them
    pub values: Vec<String>,
}

impl Entry {
    /// Creates a new entry.
    pub fn new(key: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            key: key.into(),
            values,
        }
    }

    /// Returns true if there is anything worth caching.
    pub fn has_values(&self) -> bool {
        !self.values.is_empty()
    }
}
