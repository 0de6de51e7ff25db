//! Role Category Entity
//!
//! A node of the single-rooted category tree. Categories are effectively
//! static configuration: created administratively, rarely if ever removed.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::error::{AuthzError, Result};

/// Reserved machine name of the root category
pub const ROOT_MNAME: &str = "ROOT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub i64);

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A persisted role category (`role_categories` row)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleCategory {
    pub id: CategoryId,

    /// Stable machine name, unique across all categories
    pub mname: String,

    /// Parent category; `None` only for the root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superior_id: Option<CategoryId>,
}

impl RoleCategory {
    pub fn is_root(&self) -> bool {
        self.superior_id.is_none()
    }
}

impl fmt::Display for RoleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.mname)
    }
}

/// Attributes for a category that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCategory {
    pub mname: String,
    pub superior_id: Option<CategoryId>,
}

impl NewCategory {
    pub fn root() -> Self {
        Self {
            mname: ROOT_MNAME.to_string(),
            superior_id: None,
        }
    }

    pub fn under(mname: impl Into<String>, superior_id: CategoryId) -> Self {
        Self {
            mname: mname.into(),
            superior_id: Some(superior_id),
        }
    }

    /// Machine-name rule: lowercase alphanumerics and underscores, except the
    /// reserved root literal, which is only legal without a superior.
    pub fn validate(&self) -> Result<()> {
        if self.mname == ROOT_MNAME {
            if self.superior_id.is_some() {
                return Err(AuthzError::validation(format!(
                    "category '{ROOT_MNAME}' cannot have a superior"
                )));
            }
            return Ok(());
        }

        validate_machine_name("category mname", &self.mname)?;

        if self.superior_id.is_none() {
            return Err(AuthzError::validation(format!(
                "category '{}' must name a superior; only '{ROOT_MNAME}' may be the root",
                self.mname
            )));
        }
        Ok(())
    }
}

fn machine_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9_]+$").expect("machine-name regex must compile"))
}

/// Shared rule for category mnames and role unames.
pub(crate) fn validate_machine_name(what: &str, name: &str) -> Result<()> {
    if machine_name_re().is_match(name) {
        Ok(())
    } else {
        Err(AuthzError::validation(format!(
            "{what} '{name}' must consist of lowercase letters, digits and underscores"
        )))
    }
}
