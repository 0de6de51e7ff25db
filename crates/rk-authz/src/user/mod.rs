//! User Aggregate
//!
//! Users hold zero or more roles; authorization questions about a user are
//! aggregates over the single-role queries.

pub mod authority;
pub mod entity;

pub use authority::{resolve_role_name, UserAuthority};
pub use entity::{RoleTarget, UserId, UserRoleAssoc};
