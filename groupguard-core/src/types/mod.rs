//! Domain types for GroupGuard.
//!
//! - [`Entry`]: one identity's cached group memberships
//! - [`AccessToken`]: opaque credential forwarded to the upstream provider
//! - [`MembershipCheck`]: what the upstream provider answers

mod entry;
mod membership;
mod token;

pub use entry::*;
pub use membership::*;
pub use token::*;
