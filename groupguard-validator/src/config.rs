//! Validator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use groupguard_core::constants::{DEFAULT_GROUPS_CACHE_TTL_SECS, GROUPS_CACHE_TTL_ENV};
use groupguard_core::error::{GroupsError, Result};

/// Validator configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Lifetime of a cached group membership in milliseconds (0 = never expire)
    pub cache_ttl_ms: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            cache_ttl_ms: DEFAULT_GROUPS_CACHE_TTL_SECS * 1000,
        }
    }
}

impl ValidatorConfig {
    /// Loads configuration from the environment (and `.env`, if present).
    ///
    /// `GROUPS_CACHE_TTL` holds the TTL in whole seconds.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup(GROUPS_CACHE_TTL_ENV) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                GroupsError::Config(format!(
                    "{GROUPS_CACHE_TTL_ENV} must be a number of seconds, got '{raw}'"
                ))
            })?;
            config.cache_ttl_ms = secs.saturating_mul(1000);
        }

        Ok(config)
    }

    /// Overrides the cache TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Returns the cache TTL.
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}
