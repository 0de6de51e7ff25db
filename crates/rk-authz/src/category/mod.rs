//! Role Category Aggregate
//!
//! Single-rooted tree of categories and its cached, materialized form.

pub mod cache;
pub mod entity;
pub mod tree;

pub use cache::CategoryTreeCache;
pub use entity::{CategoryId, NewCategory, RoleCategory, ROOT_MNAME};
pub use tree::{CategoryRelation, CategoryTree, TreeNode};
