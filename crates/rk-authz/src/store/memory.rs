//! In-Memory Role Store
//!
//! Backs tests and the `memory` backend. All tables live behind one lock so
//! every write is atomic with respect to its constraint checks.

use std::collections::BTreeSet;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::RoleStore;
use crate::category::{CategoryId, NewCategory, RoleCategory};
use crate::error::{AuthzError, Result};
use crate::role::{NewRole, Role, RoleId};
use crate::user::UserId;

#[derive(Default)]
struct Tables {
    categories: Vec<RoleCategory>,
    roles: Vec<Role>,
    assocs: BTreeSet<(UserId, RoleId)>,
    next_category_id: i64,
    next_role_id: i64,
}

#[derive(Default)]
pub struct MemoryRoleStore {
    tables: RwLock<Tables>,
}

impl MemoryRoleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoleStore for MemoryRoleStore {
    async fn init_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<RoleCategory>> {
        Ok(self.tables.read().categories.clone())
    }

    async fn insert_category(&self, category: NewCategory) -> Result<RoleCategory> {
        let mut tables = self.tables.write();

        if tables.categories.iter().any(|c| c.mname == category.mname) {
            return Err(AuthzError::duplicate("RoleCategory", "mname", &category.mname));
        }
        if let Some(superior_id) = category.superior_id {
            if !tables.categories.iter().any(|c| c.id == superior_id) {
                return Err(AuthzError::not_found("RoleCategory", superior_id));
            }
        }

        tables.next_category_id += 1;
        let row = RoleCategory {
            id: CategoryId(tables.next_category_id),
            mname: category.mname,
            superior_id: category.superior_id,
        };
        tables.categories.push(row.clone());
        debug!(id = %row.id, mname = %row.mname, "Inserted category");
        Ok(row)
    }

    async fn find_role(&self, id: RoleId) -> Result<Option<Role>> {
        Ok(self.tables.read().roles.iter().find(|r| r.id == id).cloned())
    }

    async fn roles_in_category(&self, category_id: CategoryId) -> Result<Vec<Role>> {
        Ok(self
            .tables
            .read()
            .roles
            .iter()
            .filter(|r| r.category_id == category_id)
            .cloned()
            .collect())
    }

    async fn find_roles_by_name(&self, name: &str) -> Result<Vec<Role>> {
        Ok(self
            .tables
            .read()
            .roles
            .iter()
            .filter(|r| r.answers_to(name))
            .cloned()
            .collect())
    }

    async fn insert_role(&self, role: NewRole) -> Result<Role> {
        let mut tables = self.tables.write();

        if !tables.categories.iter().any(|c| c.id == role.category_id) {
            return Err(AuthzError::not_found("RoleCategory", role.category_id));
        }
        if let Some(uname) = &role.uname {
            if tables.roles.iter().any(|r| r.uname.as_ref() == Some(uname)) {
                return Err(AuthzError::duplicate("Role", "uname", uname));
            }
        }
        let siblings = || tables.roles.iter().filter(|r| r.category_id == role.category_id);
        if siblings().any(|r| r.name == role.name) {
            return Err(AuthzError::duplicate("Role", "name", &role.name));
        }
        if let Some(weight) = role.weight {
            if siblings().any(|r| r.weight == Some(weight)) {
                return Err(AuthzError::DuplicateWeight {
                    weight,
                    category_id: role.category_id.0,
                });
            }
        }

        tables.next_role_id += 1;
        let row = role.into_role(RoleId(tables.next_role_id));
        tables.roles.push(row.clone());
        debug!(id = %row.id, name = %row.name, weight = ?row.weight, "Inserted role");
        Ok(row)
    }

    async fn roles_of_user(&self, user_id: UserId) -> Result<Vec<Role>> {
        let tables = self.tables.read();
        Ok(tables
            .assocs
            .range((user_id, RoleId(i64::MIN))..=(user_id, RoleId(i64::MAX)))
            .filter_map(|(_, role_id)| tables.roles.iter().find(|r| r.id == *role_id).cloned())
            .collect())
    }

    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> Result<bool> {
        let mut tables = self.tables.write();
        if !tables.roles.iter().any(|r| r.id == role_id) {
            return Err(AuthzError::not_found("Role", role_id));
        }
        Ok(tables.assocs.insert((user_id, role_id)))
    }

    async fn revoke_role(&self, user_id: UserId, role_id: RoleId) -> Result<bool> {
        Ok(self.tables.write().assocs.remove(&(user_id, role_id)))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (MemoryRoleStore, RoleCategory) {
        let store = MemoryRoleStore::new();
        let root = store.insert_category(NewCategory::root()).await.unwrap();
        let sales = store
            .insert_category(NewCategory::under("sales", root.id))
            .await
            .unwrap();
        (store, sales)
    }

    #[tokio::test]
    async fn test_category_constraints() {
        let (store, sales) = seeded().await;
        assert!(matches!(
            store.insert_category(NewCategory::under("sales", sales.id)).await,
            Err(AuthzError::Duplicate { .. })
        ));
        assert!(matches!(
            store.insert_category(NewCategory::under("ghost", CategoryId(99))).await,
            Err(AuthzError::NotFound { .. })
        ));
        assert_eq!(store.list_categories().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_role_constraints() {
        let (store, sales) = seeded().await;
        store
            .insert_role(NewRole::new("lead", sales.id).with_weight(10.0).with_uname("sales_lead"))
            .await
            .unwrap();

        let same_weight = store.insert_role(NewRole::new("clerk", sales.id).with_weight(10.0)).await;
        assert!(matches!(same_weight, Err(AuthzError::DuplicateWeight { .. })));
        assert!(same_weight.unwrap_err().is_retryable());

        let same_name = store.insert_role(NewRole::new("lead", sales.id).with_weight(20.0)).await;
        assert!(matches!(same_name, Err(AuthzError::Duplicate { .. })));

        let same_uname = store
            .insert_role(NewRole::new("other", sales.id).with_uname("sales_lead"))
            .await;
        assert!(matches!(same_uname, Err(AuthzError::Duplicate { .. })));

        // unranked roles never collide on weight
        store.insert_role(NewRole::new("guest", sales.id)).await.unwrap();
        store.insert_role(NewRole::new("visitor", sales.id)).await.unwrap();
        assert_eq!(store.roles_in_category(sales.id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_find_by_name_matches_uname() {
        let (store, sales) = seeded().await;
        let lead = store
            .insert_role(NewRole::new("Lead", sales.id).with_uname("sales_lead"))
            .await
            .unwrap();
        assert_eq!(store.find_roles_by_name("sales_lead").await.unwrap(), vec![lead.clone()]);
        assert_eq!(store.find_roles_by_name("Lead").await.unwrap(), vec![lead]);
        assert!(store.find_roles_by_name("lead").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_assignments_are_unique() {
        let (store, sales) = seeded().await;
        let clerk = store.insert_role(NewRole::new("clerk", sales.id)).await.unwrap();
        let user = UserId(7);

        assert!(store.assign_role(user, clerk.id).await.unwrap());
        assert!(!store.assign_role(user, clerk.id).await.unwrap());
        assert_eq!(store.roles_of_user(user).await.unwrap(), vec![clerk.clone()]);
        assert!(store.roles_of_user(UserId(8)).await.unwrap().is_empty());

        assert!(store.revoke_role(user, clerk.id).await.unwrap());
        assert!(!store.revoke_role(user, clerk.id).await.unwrap());
        assert!(matches!(
            store.assign_role(user, RoleId(99)).await,
            Err(AuthzError::NotFound { .. })
        ));
    }
}
