//! TTL cache for GroupGuard group memberships.
//!
//! Concurrent in-memory storage where every entry removes itself once its
//! time-to-live has elapsed. There is no size bound and no eviction beyond
//! expiry and explicit purge.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod cache;

pub use cache::{CacheStats, TtlCache};
