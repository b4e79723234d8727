//! # GroupGuard Core
//!
//! Core types, errors, and traits shared by the GroupGuard crates.
//!
//! - **Types**: cache entries, access tokens, upstream membership results
//! - **Errors**: a single cloneable error type for every layer
//! - **Constants**: defaults for cache configuration
//! - **Traits**: the upstream group-membership capability
//!
//! ## Example
//!
//! ```rust
//! use groupguard_core::Entry;
//!
//! let entry = Entry::new("alice@example.com", vec!["admins".into()]);
//! assert!(entry.has_values());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{GroupsError, Result};
pub use traits::*;
pub use types::*;
