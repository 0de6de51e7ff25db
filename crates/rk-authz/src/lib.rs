//! Rankkeeper Authorization Core
//!
//! Hierarchical role categories, ranked roles inside each category, and
//! user-level authority queries built on top of them.
//!
//! - `category`: the single-rooted category tree and its snapshot cache
//! - `role`: rank comparison and weight interpolation
//! - `user`: aggregate queries over the roles a user holds
//! - `store`: persistence (in-memory, SQLite)
//! - `service`: the async entry point tying them together

pub mod category;
pub mod error;
pub mod role;
pub mod seed;
pub mod service;
pub mod store;
pub mod user;

pub use category::{
    CategoryId, CategoryRelation, CategoryTree, CategoryTreeCache, NewCategory, RoleCategory,
    TreeNode, ROOT_MNAME,
};
pub use error::{AuthzError, Result};
pub use role::{
    midpoint_weight, NewRole, Placement, RankOrdering, Rankable, Ranker, Role, RoleId, Subject,
    WeightPlanner, WeightWindow, DEFAULT_WEIGHT_STEP,
};
pub use seed::{SeedCategory, SeedDocument, SeedReport, SeedRole, SeedUser, Seeder};
pub use service::{AuthorityService, WellKnownRoles};
pub use store::{open_store, MemoryRoleStore, RoleStore};
#[cfg(feature = "sqlite")]
pub use store::SqliteRoleStore;
pub use user::{resolve_role_name, RoleTarget, UserAuthority, UserId, UserRoleAssoc};
