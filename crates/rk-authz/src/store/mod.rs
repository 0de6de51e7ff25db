//! Role Store
//!
//! Persistence boundary for categories, roles and user-role associations.
//! Implementations enforce the same uniqueness constraints as the relational
//! schema:
//!
//! - `role_categories.mname`
//! - `roles.uname`, `(roles.weight, roles.role_category_id)`,
//!   `(roles.name, roles.role_category_id)`
//! - `(user_role_assocs.user_id, user_role_assocs.role_id)`

use std::sync::Arc;

use async_trait::async_trait;
use rk_config::{StoreBackend, StoreConfig};

use crate::category::{CategoryId, NewCategory, RoleCategory};
use crate::error::Result;
use crate::role::{NewRole, Role, RoleId};
use crate::user::UserId;

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryRoleStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteRoleStore;

#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Create tables if they do not exist
    async fn init_schema(&self) -> Result<()>;

    async fn list_categories(&self) -> Result<Vec<RoleCategory>>;

    async fn insert_category(&self, category: NewCategory) -> Result<RoleCategory>;

    async fn find_role(&self, id: RoleId) -> Result<Option<Role>>;

    async fn roles_in_category(&self, category_id: CategoryId) -> Result<Vec<Role>>;

    /// Roles whose display name or unique machine name equals `name`
    async fn find_roles_by_name(&self, name: &str) -> Result<Vec<Role>>;

    /// Insert a role. A weight collision inside the category is reported as
    /// `AuthzError::DuplicateWeight`.
    async fn insert_role(&self, role: NewRole) -> Result<Role>;

    async fn roles_of_user(&self, user_id: UserId) -> Result<Vec<Role>>;

    /// Returns false when the association already existed
    async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> Result<bool>;

    /// Returns false when there was nothing to remove
    async fn revoke_role(&self, user_id: UserId, role_id: RoleId) -> Result<bool>;

    fn backend_name(&self) -> &'static str;
}

/// Build the configured backend with its schema in place.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn RoleStore>> {
    let store: Arc<dyn RoleStore> = match config.backend {
        StoreBackend::Memory => Arc::new(MemoryRoleStore::new()),
        #[cfg(feature = "sqlite")]
        StoreBackend::Sqlite => {
            Arc::new(SqliteRoleStore::connect(&config.sqlite_url, config.max_connections).await?)
        }
        #[cfg(not(feature = "sqlite"))]
        StoreBackend::Sqlite => {
            return Err(crate::error::AuthzError::validation(
                "sqlite backend requested but the `sqlite` feature is disabled",
            ))
        }
    };
    store.init_schema().await?;
    tracing::info!(backend = store.backend_name(), "Role store ready");
    Ok(store)
}
