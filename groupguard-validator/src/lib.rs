//! # GroupGuard Validator
//!
//! Cache-aside group membership validation.
//!
//! [`MembershipValidator`] answers "which of these allowed groups is this
//! user in" by consulting a [`TtlCache`](groupguard_cache::TtlCache) first and
//! the upstream [`GroupMembershipProvider`] second. Concurrent misses for the
//! same user share a single upstream fetch.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use groupguard_validator::{MembershipValidator, StaticDirectory, ValidatorConfig};
//!
//! let directory = StaticDirectory::from_json(r#"{"alice@example.com": ["admins"]}"#)?;
//! let validator = MembershipValidator::with_config(Arc::new(directory), &ValidatorConfig::from_env()?);
//!
//! let groups = validator
//!     .validate("alice@example.com", &["admins".into()], &"token".into())
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod config;
mod directory;
mod stats;
mod validator;

pub use config::ValidatorConfig;
pub use directory::StaticDirectory;
pub use stats::{ValidatorStats, ValidatorStatsSnapshot};
pub use validator::MembershipValidator;

// Re-export the capability trait from core
pub use groupguard_core::traits::GroupMembershipProvider;
