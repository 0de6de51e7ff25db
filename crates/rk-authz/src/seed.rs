//! Seed Documents
//!
//! Declarative catalogue of categories, roles and user assignments, applied
//! idempotently: anything already present is left alone.
//!
//! ```toml
//! [[categories]]
//! mname = "ROOT"
//!
//! [[categories]]
//! mname = "harami"
//! superior = "ROOT"
//!
//! [[roles]]
//! name = "moderator"
//! category = "harami"
//! weight = 100
//!
//! [[users]]
//! id = 1
//! roles = ["moderator@harami", "sysadmin"]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::category::{NewCategory, ROOT_MNAME};
use crate::error::{AuthzError, Result};
use crate::role::NewRole;
use crate::service::AuthorityService;
use crate::user::{UserId, UserRoleAssoc};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedDocument {
    pub categories: Vec<SeedCategory>,
    pub roles: Vec<SeedRole>,
    pub users: Vec<SeedUser>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedCategory {
    pub mname: String,
    /// Machine name of the superior; omitted only for the root
    #[serde(default)]
    pub superior: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedRole {
    pub name: String,
    #[serde(default)]
    pub uname: Option<String>,
    /// Machine name of the owning category
    pub category: String,
    #[serde(default)]
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedUser {
    pub id: i64,
    /// `name@category` or a unique machine name
    #[serde(default)]
    pub roles: Vec<String>,
}

/// What an application actually changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeedReport {
    pub categories_created: usize,
    pub roles_created: usize,
    pub assignments: Vec<UserRoleAssoc>,
}

impl SeedDocument {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| AuthzError::validation(format!("invalid seed document: {e}")))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AuthzError::validation(format!("cannot read seed file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Built-in catalogue: the root with the administrative roles, plus the
    /// `harami` and `general_ja` communities.
    pub fn default_catalogue() -> Self {
        let mut doc = SeedDocument {
            categories: vec![
                SeedCategory { mname: ROOT_MNAME.to_string(), superior: None },
                SeedCategory { mname: "harami".to_string(), superior: Some(ROOT_MNAME.to_string()) },
                SeedCategory { mname: "general_ja".to_string(), superior: Some(ROOT_MNAME.to_string()) },
            ],
            roles: vec![
                SeedRole {
                    name: "sysadmin".to_string(),
                    uname: Some("sysadmin".to_string()),
                    category: ROOT_MNAME.to_string(),
                    weight: Some(1.0),
                },
                SeedRole {
                    name: "admin".to_string(),
                    uname: Some("admin".to_string()),
                    category: ROOT_MNAME.to_string(),
                    weight: Some(100.0),
                },
            ],
            users: Vec::new(),
        };

        for community in ["harami", "general_ja"] {
            for (name, weight) in [("moderator", 100.0), ("editor", 1000.0), ("helper", 100000.0)] {
                doc.roles.push(SeedRole {
                    name: name.to_string(),
                    uname: None,
                    category: community.to_string(),
                    weight: Some(weight),
                });
            }
        }
        doc
    }
}

pub struct Seeder;

impl Seeder {
    /// Insert everything in `doc` that is not present yet.
    pub async fn apply(service: &AuthorityService, doc: &SeedDocument) -> Result<SeedReport> {
        let mut report = SeedReport::default();

        report.categories_created = Self::seed_categories(service, &doc.categories).await?;
        for role in &doc.roles {
            if Self::seed_role(service, role).await? {
                report.roles_created += 1;
            }
        }
        for user in &doc.users {
            Self::seed_user(service, user, &mut report.assignments).await?;
        }

        info!(
            categories = report.categories_created,
            roles = report.roles_created,
            assignments = report.assignments.len(),
            "Seed document applied"
        );
        Ok(report)
    }

    /// Categories may be listed in any order; each pass inserts those whose
    /// superior already exists.
    async fn seed_categories(service: &AuthorityService, categories: &[SeedCategory]) -> Result<usize> {
        let store = service.store();
        let mut known: Vec<_> = store.list_categories().await?;
        let mut pending: Vec<&SeedCategory> = categories
            .iter()
            .filter(|c| !known.iter().any(|k| k.mname == c.mname))
            .collect();
        let mut created = 0;

        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();

            for category in pending {
                let new_category = match &category.superior {
                    None => NewCategory { mname: category.mname.clone(), superior_id: None },
                    Some(superior) => match known.iter().find(|k| &k.mname == superior) {
                        Some(parent) => NewCategory::under(category.mname.clone(), parent.id),
                        None => {
                            deferred.push(category);
                            continue;
                        }
                    },
                };
                known.push(service.add_category(new_category).await?);
                created += 1;
            }

            if deferred.len() == before {
                let names: Vec<&str> = deferred.iter().map(|c| c.mname.as_str()).collect();
                return Err(AuthzError::validation(format!(
                    "categories with unknown superiors: {}",
                    names.join(", ")
                )));
            }
            pending = deferred;
        }
        Ok(created)
    }

    async fn seed_role(service: &AuthorityService, role: &SeedRole) -> Result<bool> {
        let category = service.category(&role.category).await?;
        let existing = service.store().roles_in_category(category.id).await?;
        let uname_taken = match &role.uname {
            Some(uname) => service
                .store()
                .find_roles_by_name(uname)
                .await?
                .iter()
                .any(|r| r.uname.as_deref() == Some(uname.as_str())),
            None => false,
        };
        if uname_taken || existing.iter().any(|r| r.name == role.name) {
            debug!(name = %role.name, category = %role.category, "Role already seeded");
            return Ok(false);
        }

        let mut new_role = NewRole::new(role.name.clone(), category.id).with_optional_weight(role.weight);
        new_role.uname = role.uname.clone();
        service.add_role(new_role).await?;
        Ok(true)
    }

    async fn seed_user(
        service: &AuthorityService,
        user: &SeedUser,
        assignments: &mut Vec<UserRoleAssoc>,
    ) -> Result<()> {
        let user_id = UserId(user.id);
        for reference in &user.roles {
            let role = service.resolve_role_ref(reference).await?;
            if service.assign_role(user_id, role.id).await? {
                assignments.push(UserRoleAssoc { user_id, role_id: role.id });
            }
        }
        Ok(())
    }
}
