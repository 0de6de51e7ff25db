//! Role Aggregate
//!
//! Ranked roles, their comparison semantics and rank interpolation.

pub mod entity;
pub mod interpolation;
pub mod ranking;

pub use entity::{NewRole, Role, RoleId};
pub use interpolation::{midpoint_weight, Placement, WeightPlanner, WeightWindow, DEFAULT_WEIGHT_STEP};
pub use ranking::{RankOrdering, Rankable, Ranker, Subject};
