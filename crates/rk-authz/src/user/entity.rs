//! User-Role Association

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::role::{Role, RoleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One `user_role_assocs` row; (user, role) is unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRoleAssoc {
    pub user_id: UserId,
    pub role_id: RoleId,
}

/// How a caller names the role a user must qualify as.
#[derive(Debug, Clone, Copy)]
pub enum RoleTarget<'a> {
    Role(&'a Role),
    /// Display name, or unique machine name
    Name(&'a str),
}

impl<'a> From<&'a Role> for RoleTarget<'a> {
    fn from(role: &'a Role) -> Self {
        Self::Role(role)
    }
}

impl<'a> From<&'a str> for RoleTarget<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

impl<'a> From<&'a String> for RoleTarget<'a> {
    fn from(name: &'a String) -> Self {
        Self::Name(name.as_str())
    }
}
