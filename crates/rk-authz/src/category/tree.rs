//! Materialized Category Tree
//!
//! Arena of category records with index-based parent links and a children
//! adjacency list derived once per build. The tree is immutable after
//! construction; a refresh builds a new one.

use std::collections::HashMap;
use std::fmt::Write as _;

use serde::Serialize;

use super::entity::{CategoryId, RoleCategory};
use crate::error::{AuthzError, Result};

/// Structural relation between two categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CategoryRelation {
    Equal,
    /// The first category is a strict ancestor of the second
    AAncestorOfB,
    /// The second category is a strict ancestor of the first
    BAncestorOfA,
    Unrelated,
}

impl CategoryRelation {
    pub fn is_related(self) -> bool {
        !matches!(self, Self::Unrelated)
    }

    /// The relation seen from the other side.
    pub fn reverse(self) -> Self {
        match self {
            Self::AAncestorOfB => Self::BAncestorOfA,
            Self::BAncestorOfA => Self::AAncestorOfB,
            other => other,
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    category: RoleCategory,
    parent: Option<usize>,
    children: Vec<usize>,
    depth: usize,
}

#[derive(Debug, Clone)]
pub struct CategoryTree {
    slots: Vec<Slot>,
    by_id: HashMap<CategoryId, usize>,
    by_mname: HashMap<String, usize>,
    root: usize,
}

/// Borrowed view of one node: the category plus its ordered children.
#[derive(Clone, Copy)]
pub struct TreeNode<'a> {
    tree: &'a CategoryTree,
    slot: usize,
}

impl<'a> TreeNode<'a> {
    pub fn category(&self) -> &'a RoleCategory {
        &self.tree.slots[self.slot].category
    }

    pub fn depth(&self) -> usize {
        self.tree.slots[self.slot].depth
    }

    pub fn superior(&self) -> Option<TreeNode<'a>> {
        self.tree.slots[self.slot].parent.map(|slot| TreeNode { tree: self.tree, slot })
    }

    pub fn children(&self) -> impl Iterator<Item = TreeNode<'a>> + 'a {
        let tree = self.tree;
        tree.slots[self.slot]
            .children
            .iter()
            .map(move |&slot| TreeNode { tree, slot })
    }
}

impl std::fmt::Debug for TreeNode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeNode")
            .field("mname", &self.category().mname)
            .field("depth", &self.depth())
            .finish()
    }
}

impl CategoryTree {
    /// Build the tree from persisted rows.
    ///
    /// Rejects rows that do not form a single-rooted, acyclic tree.
    pub fn build(mut categories: Vec<RoleCategory>) -> Result<Self> {
        categories.sort_by_key(|c| c.id);

        let mut by_id = HashMap::with_capacity(categories.len());
        let mut by_mname = HashMap::with_capacity(categories.len());
        for (slot, category) in categories.iter().enumerate() {
            if by_id.insert(category.id, slot).is_some() {
                return Err(AuthzError::validation(format!(
                    "duplicate category id {}",
                    category.id
                )));
            }
            if by_mname.insert(category.mname.clone(), slot).is_some() {
                return Err(AuthzError::validation(format!(
                    "duplicate category mname '{}'",
                    category.mname
                )));
            }
        }

        let roots: Vec<usize> = categories
            .iter()
            .enumerate()
            .filter(|(_, c)| c.superior_id.is_none())
            .map(|(slot, _)| slot)
            .collect();
        let root = match roots.as_slice() {
            [] => return Err(AuthzError::not_found("RoleCategory", "root")),
            [root] => *root,
            many => {
                return Err(AuthzError::validation(format!(
                    "category tree has {} roots",
                    many.len()
                )))
            }
        };

        let mut parents = Vec::with_capacity(categories.len());
        for category in &categories {
            let parent = match category.superior_id {
                None => None,
                Some(superior_id) => Some(*by_id.get(&superior_id).ok_or_else(|| {
                    AuthzError::validation(format!(
                        "category '{}' refers to missing superior {}",
                        category.mname, superior_id
                    ))
                })?),
            };
            parents.push(parent);
        }

        let mut children = vec![Vec::new(); categories.len()];
        for (slot, parent) in parents.iter().enumerate() {
            if let Some(parent) = parent {
                children[*parent].push(slot);
            }
        }

        // Depth by breadth-first walk from the root; anything unreached sits on a cycle.
        let mut depths = vec![usize::MAX; categories.len()];
        depths[root] = 0;
        let mut queue = std::collections::VecDeque::from([root]);
        while let Some(slot) = queue.pop_front() {
            for &child in &children[slot] {
                depths[child] = depths[slot] + 1;
                queue.push_back(child);
            }
        }
        if let Some(slot) = depths.iter().position(|d| *d == usize::MAX) {
            return Err(AuthzError::validation(format!(
                "category '{}' is not reachable from the root (cycle in superiors)",
                categories[slot].mname
            )));
        }

        let slots = categories
            .into_iter()
            .zip(parents)
            .zip(children)
            .zip(depths)
            .map(|(((category, parent), children), depth)| Slot {
                category,
                parent,
                children,
                depth,
            })
            .collect();

        Ok(Self {
            slots,
            by_id,
            by_mname,
            root,
        })
    }

    fn slot_of(&self, id: CategoryId) -> Result<usize> {
        self.by_id
            .get(&id)
            .copied()
            .ok_or_else(|| AuthzError::not_found("RoleCategory", id))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn root_category(&self) -> &RoleCategory {
        &self.slots[self.root].category
    }

    pub fn root_node(&self) -> TreeNode<'_> {
        TreeNode { tree: self, slot: self.root }
    }

    pub fn node(&self, id: CategoryId) -> Option<TreeNode<'_>> {
        self.by_id.get(&id).map(|&slot| TreeNode { tree: self, slot })
    }

    pub fn get(&self, id: CategoryId) -> Option<&RoleCategory> {
        self.by_id.get(&id).map(|&slot| &self.slots[slot].category)
    }

    pub fn find_by_mname(&self, mname: &str) -> Option<&RoleCategory> {
        self.by_mname.get(mname).map(|&slot| &self.slots[slot].category)
    }

    pub fn contains(&self, id: CategoryId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn depth_of(&self, id: CategoryId) -> Result<usize> {
        Ok(self.slots[self.slot_of(id)?].depth)
    }

    /// Ancestors ordered from the root down, excluding the category itself.
    pub fn ancestors_of(&self, id: CategoryId) -> Result<Vec<&RoleCategory>> {
        let mut slot = self.slot_of(id)?;
        let mut chain = Vec::with_capacity(self.slots[slot].depth);
        while let Some(parent) = self.slots[slot].parent {
            chain.push(&self.slots[parent].category);
            slot = parent;
        }
        chain.reverse();
        Ok(chain)
    }

    pub fn children_of(&self, id: CategoryId) -> Result<Vec<&RoleCategory>> {
        let slot = self.slot_of(id)?;
        Ok(self.slots[slot]
            .children
            .iter()
            .map(|&child| &self.slots[child].category)
            .collect())
    }

    /// All strict descendants in pre-order.
    pub fn descendants_of(&self, id: CategoryId) -> Result<Vec<&RoleCategory>> {
        let slot = self.slot_of(id)?;
        let mut out = Vec::new();
        let mut stack: Vec<usize> = self.slots[slot].children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(&self.slots[next].category);
            stack.extend(self.slots[next].children.iter().rev().copied());
        }
        Ok(out)
    }

    /// Structural comparison of two categories.
    pub fn compare(&self, a: CategoryId, b: CategoryId) -> Result<CategoryRelation> {
        let a_slot = self.slot_of(a)?;
        let b_slot = self.slot_of(b)?;
        if a_slot == b_slot {
            return Ok(CategoryRelation::Equal);
        }

        let a_depth = self.slots[a_slot].depth;
        let b_depth = self.slots[b_slot].depth;
        if a_depth == b_depth {
            return Ok(CategoryRelation::Unrelated);
        }

        let (deep, shallow, shallow_depth) = if a_depth > b_depth {
            (a_slot, b_slot, b_depth)
        } else {
            (b_slot, a_slot, a_depth)
        };
        let mut cursor = deep;
        while self.slots[cursor].depth > shallow_depth {
            match self.slots[cursor].parent {
                Some(parent) => cursor = parent,
                None => break,
            }
        }
        if cursor != shallow {
            return Ok(CategoryRelation::Unrelated);
        }

        Ok(if shallow == a_slot {
            CategoryRelation::AAncestorOfB
        } else {
            CategoryRelation::BAncestorOfA
        })
    }

    pub fn is_related(&self, a: CategoryId, b: CategoryId) -> Result<bool> {
        Ok(self.compare(a, b)?.is_related())
    }

    /// True iff `a` is a strict ancestor of `b`.
    pub fn is_ancestor_of(&self, a: CategoryId, b: CategoryId) -> Result<bool> {
        Ok(self.compare(a, b)? == CategoryRelation::AAncestorOfB)
    }

    /// Categories in pre-order, root first.
    pub fn iter(&self) -> impl Iterator<Item = &RoleCategory> {
        std::iter::once(self.root_category()).chain(
            self.descendants_of(self.root_category().id)
                .unwrap_or_default()
                .into_iter(),
        )
    }

    /// Indented text dump, one category per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut stack = vec![self.root];
        while let Some(slot) = stack.pop() {
            let s = &self.slots[slot];
            let _ = writeln!(out, "{}{}", "  ".repeat(s.depth), s.category.mname);
            stack.extend(s.children.iter().rev().copied());
        }
        out
    }

    /// Structural fingerprint: (id, superior id) pairs in pre-order.
    pub fn shape(&self) -> Vec<(CategoryId, Option<CategoryId>)> {
        self.iter().map(|c| (c.id, c.superior_id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cat(id: i64, mname: &str, superior: Option<i64>) -> RoleCategory {
        RoleCategory {
            id: CategoryId(id),
            mname: mname.to_string(),
            superior_id: superior.map(CategoryId),
        }
    }

    /// ROOT(1) -> harami(2) -> club(4); ROOT -> general_ja(3)
    fn sample() -> CategoryTree {
        CategoryTree::build(vec![
            cat(3, "general_ja", Some(1)),
            cat(1, "ROOT", None),
            cat(4, "club", Some(2)),
            cat(2, "harami", Some(1)),
        ])
        .unwrap()
    }

    #[test]
    fn test_root_and_lookup() {
        let tree = sample();
        assert_eq!(tree.root_category().mname, "ROOT");
        assert_eq!(tree.find_by_mname("club").unwrap().id, CategoryId(4));
        assert!(tree.get(CategoryId(9)).is_none());
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_ancestors_root_first() {
        let tree = sample();
        let names: Vec<&str> = tree
            .ancestors_of(CategoryId(4))
            .unwrap()
            .iter()
            .map(|c| c.mname.as_str())
            .collect();
        assert_eq!(names, vec!["ROOT", "harami"]);
        assert!(tree.ancestors_of(CategoryId(1)).unwrap().is_empty());
    }

    #[test]
    fn test_compare_relations() {
        let tree = sample();
        let (root, harami, general, club) = (CategoryId(1), CategoryId(2), CategoryId(3), CategoryId(4));

        assert_eq!(tree.compare(harami, harami).unwrap(), CategoryRelation::Equal);
        assert_eq!(tree.compare(root, club).unwrap(), CategoryRelation::AAncestorOfB);
        assert_eq!(tree.compare(club, harami).unwrap(), CategoryRelation::BAncestorOfA);
        assert_eq!(tree.compare(harami, general).unwrap(), CategoryRelation::Unrelated);
        assert_eq!(tree.compare(club, general).unwrap(), CategoryRelation::Unrelated);
        assert!(!tree.is_related(general, club).unwrap());
        assert!(tree.is_ancestor_of(root, general).unwrap());
        assert!(!tree.is_ancestor_of(general, root).unwrap());
    }

    #[test]
    fn test_compare_unknown_category_is_not_found() {
        let tree = sample();
        assert!(matches!(
            tree.compare(CategoryId(1), CategoryId(42)),
            Err(AuthzError::NotFound { .. })
        ));
    }

    #[test]
    fn test_children_ordered_and_descendants_preorder() {
        let tree = sample();
        let children: Vec<&str> = tree
            .children_of(CategoryId(1))
            .unwrap()
            .iter()
            .map(|c| c.mname.as_str())
            .collect();
        assert_eq!(children, vec!["harami", "general_ja"]);

        let all: Vec<&str> = tree.iter().map(|c| c.mname.as_str()).collect();
        assert_eq!(all, vec!["ROOT", "harami", "club", "general_ja"]);
    }

    #[test]
    fn test_node_navigation() {
        let tree = sample();
        let club = tree.node(CategoryId(4)).unwrap();
        assert_eq!(club.depth(), 2);
        assert_eq!(club.superior().unwrap().category().mname, "harami");
        let root_children: Vec<_> = tree.root_node().children().map(|n| n.category().id).collect();
        assert_eq!(root_children, vec![CategoryId(2), CategoryId(3)]);
    }

    #[test]
    fn test_render() {
        assert_eq!(sample().render(), "ROOT\n  harami\n    club\n  general_ja\n");
    }

    #[test]
    fn test_build_rejects_malformed_rows() {
        // no root
        assert!(CategoryTree::build(vec![cat(1, "a", Some(2)), cat(2, "b", Some(1))]).is_err());
        // two roots
        assert!(CategoryTree::build(vec![cat(1, "ROOT", None), cat(2, "other", None)]).is_err());
        // dangling superior
        assert!(CategoryTree::build(vec![cat(1, "ROOT", None), cat(2, "a", Some(7))]).is_err());
        // cycle detached from the root
        assert!(CategoryTree::build(vec![
            cat(1, "ROOT", None),
            cat(2, "a", Some(3)),
            cat(3, "b", Some(2)),
        ])
        .is_err());
        // duplicate mname
        assert!(CategoryTree::build(vec![cat(1, "ROOT", None), cat(2, "ROOT", Some(1))]).is_err());
    }
}
