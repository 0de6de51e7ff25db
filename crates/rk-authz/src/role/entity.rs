//! Role Entity
//!
//! A rank inside one category. Lower weight means higher rank; an absent
//! weight means "unranked".

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::category::entity::validate_machine_name;
use crate::category::CategoryId;
use crate::error::{AuthzError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(pub i64);

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted role (`roles` row)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: RoleId,

    /// Display name, unique within the category
    pub name: String,

    /// Optional globally unique machine name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uname: Option<String>,

    pub category_id: CategoryId,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl Role {
    /// Identity comparison; two rows are the same role iff their ids match.
    pub fn is_same(&self, other: &Role) -> bool {
        self.id == other.id
    }

    pub fn is_ranked(&self) -> bool {
        self.weight.is_some()
    }

    /// Weight for ordering purposes, unranked sorting last.
    pub fn effective_weight(&self) -> f64 {
        self.weight.unwrap_or(f64::INFINITY)
    }

    /// Whether this role answers to `name` (display name or machine name).
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.uname.as_deref() == Some(name)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.uname {
            Some(uname) => write!(f, "{} ({uname})", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Attributes for a role that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRole {
    pub name: String,
    pub uname: Option<String>,
    pub category_id: CategoryId,
    pub weight: Option<f64>,
}

impl NewRole {
    pub fn new(name: impl Into<String>, category_id: CategoryId) -> Self {
        Self {
            name: name.into(),
            uname: None,
            category_id,
            weight: None,
        }
    }

    pub fn with_uname(mut self, uname: impl Into<String>) -> Self {
        self.uname = Some(uname.into());
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_optional_weight(mut self, weight: Option<f64>) -> Self {
        self.weight = weight;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AuthzError::validation("role name is required"));
        }
        if let Some(uname) = &self.uname {
            validate_machine_name("role uname", uname)?;
        }
        if let Some(weight) = self.weight {
            if !weight.is_finite() {
                return Err(AuthzError::validation(format!(
                    "role weight must be a finite number, got {weight}"
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn into_role(self, id: RoleId) -> Role {
        Role {
            id,
            name: self.name,
            uname: self.uname,
            category_id: self.category_id,
            weight: self.weight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unranked_weight_sorts_last() {
        let ranked = NewRole::new("editor", CategoryId(2)).with_weight(1000.0).into_role(RoleId(1));
        let unranked = NewRole::new("guest", CategoryId(2)).into_role(RoleId(2));
        assert!(ranked.is_ranked());
        assert!(!unranked.is_ranked());
        assert!(ranked.effective_weight() < unranked.effective_weight());
    }

    #[test]
    fn test_answers_to_name_or_uname() {
        let role = NewRole::new("Admin", CategoryId(1))
            .with_uname("sysadmin")
            .into_role(RoleId(1));
        assert!(role.answers_to("Admin"));
        assert!(role.answers_to("sysadmin"));
        assert!(!role.answers_to("admin"));
        assert_eq!(role.to_string(), "Admin (sysadmin)");
    }

    #[test]
    fn test_validation() {
        assert!(NewRole::new("editor", CategoryId(1)).validate().is_ok());
        assert!(NewRole::new("  ", CategoryId(1)).validate().is_err());
        assert!(NewRole::new("x", CategoryId(1)).with_uname("Bad Name").validate().is_err());
        assert!(NewRole::new("x", CategoryId(1)).with_weight(f64::NAN).validate().is_err());
        assert!(NewRole::new("x", CategoryId(1)).with_weight(-3.5).validate().is_ok());
    }
}
