//! Defaults shared across GroupGuard crates.

/// Default lifetime of a cached group membership, in seconds.
pub const DEFAULT_GROUPS_CACHE_TTL_SECS: u64 = 300;

/// Environment variable holding the group cache TTL in seconds.
pub const GROUPS_CACHE_TTL_ENV: &str = "GROUPS_CACHE_TTL";
