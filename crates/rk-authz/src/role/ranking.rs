//! Rank Comparison
//!
//! Roles are ordered first by their categories (a role in an ancestor
//! category outranks any role below it) and, within one category, by weight.
//! Roles in categories with no ancestor relation are incomparable.
//!
//! Two unranked roles in the same category compare `Equal` for sorting, yet
//! neither qualifies as the other. Only a ranked role can satisfy a different
//! role of its own category.

use std::cmp::Ordering;

use serde::Serialize;

use super::entity::Role;
use crate::category::{CategoryRelation, CategoryTree, RoleCategory};
use crate::error::{AuthzError, Result};

/// Outcome of a rank comparison. `Less` means higher rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RankOrdering {
    Equal,
    Less,
    Greater,
    Unrelated,
}

impl RankOrdering {
    pub fn reverse(self) -> Self {
        match self {
            Self::Less => Self::Greater,
            Self::Greater => Self::Less,
            other => other,
        }
    }

    pub fn is_related(self) -> bool {
        !matches!(self, Self::Unrelated)
    }

    pub fn to_ordering(self) -> Option<Ordering> {
        match self {
            Self::Equal => Some(Ordering::Equal),
            Self::Less => Some(Ordering::Less),
            Self::Greater => Some(Ordering::Greater),
            Self::Unrelated => None,
        }
    }
}

impl From<CategoryRelation> for RankOrdering {
    fn from(relation: CategoryRelation) -> Self {
        match relation {
            CategoryRelation::Equal => Self::Equal,
            CategoryRelation::AAncestorOfB => Self::Less,
            CategoryRelation::BAncestorOfA => Self::Greater,
            CategoryRelation::Unrelated => Self::Unrelated,
        }
    }
}

/// What a rankable value is, for comparisons that accept either kind.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    Category(&'a RoleCategory),
    Role(&'a Role),
}

/// Closed interface over the two comparable types.
pub trait Rankable {
    fn subject(&self) -> Subject<'_>;
}

impl Rankable for RoleCategory {
    fn subject(&self) -> Subject<'_> {
        Subject::Category(self)
    }
}

impl Rankable for Role {
    fn subject(&self) -> Subject<'_> {
        Subject::Role(self)
    }
}

fn describe(subject: Subject<'_>) -> String {
    match subject {
        Subject::Category(c) => format!("RoleCategory '{}'", c.mname),
        Subject::Role(r) => format!("Role '{}'", r.name),
    }
}

/// Weight order with unranked last; NaN cannot occur (rejected on insert).
fn weight_order(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (Some(a), Some(b)) => a.total_cmp(&b),
    }
}

/// Comparison engine bound to one category tree snapshot.
#[derive(Clone, Copy)]
pub struct Ranker<'t> {
    tree: &'t CategoryTree,
}

impl<'t> Ranker<'t> {
    pub fn new(tree: &'t CategoryTree) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &'t CategoryTree {
        self.tree
    }

    fn category_name(&self, role: &Role) -> String {
        self.tree
            .get(role.category_id)
            .map(|c| c.mname.clone())
            .unwrap_or_else(|| role.category_id.to_string())
    }

    /// Category order: an ancestor ranks higher (`Less`).
    pub fn compare_categories(&self, a: &RoleCategory, b: &RoleCategory) -> Result<RankOrdering> {
        Ok(self.tree.compare(a.id, b.id)?.into())
    }

    pub fn compare(&self, x: &Role, y: &Role) -> Result<RankOrdering> {
        if x.is_same(y) {
            return Ok(RankOrdering::Equal);
        }

        match self.tree.compare(x.category_id, y.category_id)? {
            CategoryRelation::Equal => {}
            relation => return Ok(relation.into()),
        }

        Ok(match weight_order(x.weight, y.weight) {
            Ordering::Less => RankOrdering::Less,
            Ordering::Equal => RankOrdering::Equal,
            Ordering::Greater => RankOrdering::Greater,
        })
    }

    /// Compare two values of either kind; mixing a category with a role is a
    /// type conflict.
    pub fn compare_subjects(&self, a: &dyn Rankable, b: &dyn Rankable) -> Result<RankOrdering> {
        match (a.subject(), b.subject()) {
            (Subject::Category(a), Subject::Category(b)) => self.compare_categories(a, b),
            (Subject::Role(a), Subject::Role(b)) => self.compare(a, b),
            (left, right) => Err(AuthzError::type_conflict(describe(left), describe(right))),
        }
    }

    /// Whether `role` satisfies `candidate`: the same role, a role in a strict
    /// ancestor category, or a ranked role of the same category with a weight
    /// no greater than the candidate's.
    pub fn qualified_as(&self, role: &Role, candidate: &Role) -> Result<bool> {
        if role.is_same(candidate) {
            return Ok(true);
        }

        Ok(match self.tree.compare(role.category_id, candidate.category_id)? {
            CategoryRelation::AAncestorOfB => true,
            CategoryRelation::BAncestorOfA | CategoryRelation::Unrelated => false,
            CategoryRelation::Equal => match role.weight {
                Some(weight) => weight <= candidate.effective_weight(),
                None => false,
            },
        })
    }

    /// Strictly higher rank; false for unrelated roles.
    pub fn outranks(&self, x: &Role, y: &Role) -> Result<bool> {
        Ok(self.compare(x, y)? == RankOrdering::Less)
    }

    fn strict(&self, x: &Role, y: &Role) -> Result<Ordering> {
        self.compare(x, y)?
            .to_ordering()
            .ok_or_else(|| AuthzError::unrelated(self.category_name(x), self.category_name(y)))
    }

    pub fn lt(&self, x: &Role, y: &Role) -> Result<bool> {
        Ok(self.strict(x, y)? == Ordering::Less)
    }

    pub fn le(&self, x: &Role, y: &Role) -> Result<bool> {
        Ok(self.strict(x, y)? != Ordering::Greater)
    }

    pub fn gt(&self, x: &Role, y: &Role) -> Result<bool> {
        Ok(self.strict(x, y)? == Ordering::Greater)
    }

    pub fn ge(&self, x: &Role, y: &Role) -> Result<bool> {
        Ok(self.strict(x, y)? != Ordering::Less)
    }

    /// Stable sort by weight, unranked last.
    pub fn sort_roles(roles: &mut [Role]) {
        roles.sort_by(|a, b| weight_order(a.weight, b.weight));
    }

    /// Roles of `role`'s category that strictly outrank it, best first.
    pub fn superiors_in_category<'r>(&self, role: &Role, roles: &'r [Role]) -> Vec<&'r Role> {
        let mut out: Vec<&Role> = roles
            .iter()
            .filter(|r| r.category_id == role.category_id && !r.is_same(role))
            .filter(|r| weight_order(r.weight, role.weight) == Ordering::Less)
            .collect();
        out.sort_by(|a, b| weight_order(a.weight, b.weight));
        out
    }

    /// Roles of `role`'s category that it strictly outranks, best first.
    pub fn subordinates_in_category<'r>(&self, role: &Role, roles: &'r [Role]) -> Vec<&'r Role> {
        let mut out: Vec<&Role> = roles
            .iter()
            .filter(|r| r.category_id == role.category_id && !r.is_same(role))
            .filter(|r| weight_order(r.weight, role.weight) == Ordering::Greater)
            .collect();
        out.sort_by(|a, b| weight_order(a.weight, b.weight));
        out
    }
}
