//! User Authority
//!
//! Lifts the single-role queries to a user holding any number of roles.
//! Qualification is existential over the held roles; superiority is
//! universal over the other user's roles.

use std::sync::Arc;

use crate::category::{CategoryId, CategoryRelation, CategoryTree};
use crate::error::{AuthzError, Result};
use crate::role::{Role, Ranker};

use super::entity::UserId;

/// Resolve a bare role name among `candidates`.
///
/// Only roles in `category` are considered when one is given. Among those a
/// unique machine name wins outright; otherwise display names are matched and
/// more than one match is ambiguous.
pub fn resolve_role_name(
    candidates: &[Role],
    name: &str,
    category: Option<CategoryId>,
) -> Result<Option<Role>> {
    let in_scope = |r: &&Role| category.map_or(true, |c| r.category_id == c);

    if let Some(role) = candidates
        .iter()
        .filter(in_scope)
        .find(|r| r.uname.as_deref() == Some(name))
    {
        return Ok(Some(role.clone()));
    }

    let matches: Vec<&Role> = candidates
        .iter()
        .filter(in_scope)
        .filter(|r| r.name == name)
        .collect();

    match matches.as_slice() {
        [] => Ok(None),
        [role] => Ok(Some((*role).clone())),
        many => Err(AuthzError::ambiguous(name, many.len())),
    }
}

/// A user's roles bound to the category tree snapshot they were loaded with.
#[derive(Debug, Clone)]
pub struct UserAuthority {
    user_id: UserId,
    roles: Vec<Role>,
    tree: Arc<CategoryTree>,
}

impl UserAuthority {
    pub fn new(user_id: UserId, mut roles: Vec<Role>, tree: Arc<CategoryTree>) -> Self {
        roles.sort_by_key(|r| r.id);
        roles.dedup_by_key(|r| r.id);
        Self { user_id, roles, tree }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn tree(&self) -> &CategoryTree {
        &self.tree
    }

    fn ranker(&self) -> Ranker<'_> {
        Ranker::new(&self.tree)
    }

    pub fn holds(&self, role: &Role) -> bool {
        self.roles.iter().any(|r| r.is_same(role))
    }

    pub fn roles_in(&self, category: CategoryId) -> Vec<&Role> {
        self.roles.iter().filter(|r| r.category_id == category).collect()
    }

    /// Holds any role in the root category.
    pub fn is_an_admin(&self) -> bool {
        let root = self.tree.root_category().id;
        self.roles.iter().any(|r| r.category_id == root)
    }

    /// True iff some held role qualifies as `target`.
    pub fn qualified_as(&self, target: &Role) -> Result<bool> {
        let ranker = self.ranker();
        for role in &self.roles {
            if ranker.qualified_as(role, target)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn related_to(&self, category: CategoryId) -> Result<Vec<&Role>> {
        let mut out = Vec::new();
        for role in &self.roles {
            if self.tree.is_related(role.category_id, category)? {
                out.push(role);
            }
        }
        Ok(out)
    }

    fn covers_all(&self, mine: &[&Role], theirs: &[&Role]) -> Result<bool> {
        let ranker = self.ranker();
        'theirs: for their_role in theirs {
            for my_role in mine {
                if ranker.outranks(my_role, their_role)? {
                    continue 'theirs;
                }
            }
            return Ok(false);
        }
        Ok(true)
    }

    /// Every role the other user holds is strictly outranked by one of ours.
    /// Vacuously true when the other user holds no roles.
    pub fn abs_superior_to(&self, other: &UserAuthority) -> Result<bool> {
        let mine: Vec<&Role> = self.roles.iter().collect();
        let theirs: Vec<&Role> = other.roles.iter().collect();
        self.covers_all(&mine, &theirs)
    }

    /// As [`abs_superior_to`](Self::abs_superior_to), restricted on both
    /// sides to roles whose category is related to `category`.
    pub fn superior_to(&self, other: &UserAuthority, category: Option<CategoryId>) -> Result<bool> {
        let Some(category) = category else {
            return self.abs_superior_to(other);
        };
        let mine = self.related_to(category)?;
        let theirs = other.related_to(category)?;
        self.covers_all(&mine, &theirs)
    }

    /// The best held role in `category` or one of its ancestors.
    ///
    /// Weights only order roles inside one category, so "minimal weight" is
    /// read through the rank order: a role in an ancestor category (smaller
    /// depth) always wins, then the lowest weight, then the lowest id.
    pub fn highest_role_in(&self, category: CategoryId) -> Result<Option<&Role>> {
        let mut best: Option<(usize, &Role)> = None;
        for role in &self.roles {
            let relation = self.tree.compare(role.category_id, category)?;
            if !matches!(relation, CategoryRelation::Equal | CategoryRelation::AAncestorOfB) {
                continue;
            }
            let depth = self.tree.depth_of(role.category_id)?;
            let better = match best {
                None => true,
                Some((best_depth, best_role)) => {
                    (depth, role.effective_weight(), role.id)
                        .partial_cmp(&(best_depth, best_role.effective_weight(), best_role.id))
                        == Some(std::cmp::Ordering::Less)
                }
            };
            if better {
                best = Some((depth, role));
            }
        }
        Ok(best.map(|(_, role)| role))
    }
}
