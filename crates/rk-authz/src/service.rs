//! Authority Service
//!
//! Entry point for callers: owns the role store and the category tree
//! snapshot, and answers the user-level authorization queries.
//!
//! Rank interpolation reads the neighbouring weights and writes the new row
//! without a serializable transaction. The store's unique `(weight,
//! category)` constraint is the backstop; a collision is retried with freshly
//! read neighbours up to `max_insert_attempts` times.

use std::sync::Arc;

use rk_config::{AppConfig, RankingConfig, WellKnownConfig};
use tracing::{debug, info, warn};

use crate::category::{CategoryId, CategoryTree, CategoryTreeCache, NewCategory, RoleCategory};
use crate::error::{AuthzError, Result};
use crate::role::{NewRole, Placement, RankOrdering, Ranker, Role, RoleId, WeightPlanner};
use crate::store::{open_store, RoleStore};
use crate::user::{resolve_role_name, RoleTarget, UserAuthority, UserId};

/// Role names behind the convenience predicates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WellKnownRoles {
    /// Category searched by `is_moderator` / `is_editor`
    pub default_category: String,
    pub moderator: String,
    pub editor: String,
    pub sysadmin: String,
}

impl Default for WellKnownRoles {
    fn default() -> Self {
        Self::from(&WellKnownConfig::default())
    }
}

impl From<&WellKnownConfig> for WellKnownRoles {
    fn from(config: &WellKnownConfig) -> Self {
        Self {
            default_category: config.default_category.clone(),
            moderator: config.moderator.clone(),
            editor: config.editor.clone(),
            sysadmin: config.sysadmin.clone(),
        }
    }
}

pub struct AuthorityService {
    store: Arc<dyn RoleStore>,
    cache: CategoryTreeCache,
    planner: WeightPlanner,
    max_insert_attempts: u32,
    well_known: WellKnownRoles,
}

impl AuthorityService {
    pub fn new(store: Arc<dyn RoleStore>) -> Self {
        Self {
            store,
            cache: CategoryTreeCache::new(),
            planner: WeightPlanner::default(),
            max_insert_attempts: RankingConfig::default().max_insert_attempts,
            well_known: WellKnownRoles::default(),
        }
    }

    pub fn with_ranking(mut self, ranking: &RankingConfig) -> Self {
        self.planner = WeightPlanner::new(ranking.weight_step);
        self.max_insert_attempts = ranking.max_insert_attempts.max(1);
        self
    }

    pub fn with_well_known(mut self, well_known: WellKnownRoles) -> Self {
        self.well_known = well_known;
        self
    }

    pub fn from_config(store: Arc<dyn RoleStore>, config: &AppConfig) -> Self {
        Self::new(store)
            .with_ranking(&config.ranking)
            .with_well_known(WellKnownRoles::from(&config.well_known))
    }

    /// Open the configured store and wrap it in a service.
    pub async fn open(config: &AppConfig) -> Result<Self> {
        let store = open_store(&config.store).await?;
        Ok(Self::from_config(store, config))
    }

    pub fn store(&self) -> &Arc<dyn RoleStore> {
        &self.store
    }

    pub fn cache(&self) -> &CategoryTreeCache {
        &self.cache
    }

    pub fn well_known(&self) -> &WellKnownRoles {
        &self.well_known
    }

    // ========================================================================
    // Categories
    // ========================================================================

    pub async fn cached_tree(&self, force_refresh: bool) -> Result<Arc<CategoryTree>> {
        self.cache.cached_tree(self.store.as_ref(), force_refresh).await
    }

    pub async fn root_category(&self) -> Result<RoleCategory> {
        Ok(self.cached_tree(false).await?.root_category().clone())
    }

    /// Look a category up by machine name. A miss re-reads the store once
    /// before giving up, since the snapshot may predate another writer.
    pub async fn category(&self, mname: &str) -> Result<RoleCategory> {
        if let Some(category) = self.cached_tree(false).await?.find_by_mname(mname) {
            return Ok(category.clone());
        }
        self.cached_tree(true)
            .await?
            .find_by_mname(mname)
            .cloned()
            .ok_or_else(|| AuthzError::not_found("RoleCategory", mname))
    }

    /// Insert a category and publish a refreshed tree.
    pub async fn add_category(&self, category: NewCategory) -> Result<RoleCategory> {
        category.validate()?;
        let created = self.store.insert_category(category).await?;
        self.cache.refresh(self.store.as_ref()).await?;
        info!(id = %created.id, mname = %created.mname, "Category created");
        Ok(created)
    }

    // ========================================================================
    // Roles
    // ========================================================================

    pub async fn add_role(&self, role: NewRole) -> Result<Role> {
        role.validate()?;
        let created = self.store.insert_role(role).await?;
        info!(id = %created.id, role = %created, weight = ?created.weight, "Role created");
        Ok(created)
    }

    /// Resolve a role by machine name, or by display name within `category`.
    pub async fn resolve_role(&self, name: &str, category: Option<CategoryId>) -> Result<Role> {
        let candidates = self.store.find_roles_by_name(name).await?;
        resolve_role_name(&candidates, name, category)?
            .ok_or_else(|| AuthzError::not_found("Role", name))
    }

    /// Resolve `name@category`, or a bare machine name.
    pub async fn resolve_role_ref(&self, reference: &str) -> Result<Role> {
        match reference.split_once('@') {
            Some((name, mname)) => {
                let category = self.category(mname).await?;
                self.resolve_role(name, Some(category.id)).await
            }
            None => self.resolve_role(reference, None).await,
        }
    }

    /// New role ranked directly below `superior`.
    pub async fn create_subordinate(
        &self,
        superior: &Role,
        name: &str,
        weight: Option<f64>,
    ) -> Result<Role> {
        self.insert_near(superior, name, weight, Placement::Subordinate).await
    }

    /// New role ranked directly above `subordinate`.
    pub async fn create_superior(
        &self,
        subordinate: &Role,
        name: &str,
        weight: Option<f64>,
    ) -> Result<Role> {
        self.insert_near(subordinate, name, weight, Placement::Superior).await
    }

    async fn insert_near(
        &self,
        reference: &Role,
        name: &str,
        requested: Option<f64>,
        placement: Placement,
    ) -> Result<Role> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let current = self.store.find_role(reference.id).await?.ok_or_else(|| {
                AuthzError::precondition(format!(
                    "reference role '{}' (id {}) is not persisted",
                    reference.name, reference.id
                ))
            })?;
            let siblings = self.store.roles_in_category(current.category_id).await?;
            let weight = self.planner.plan(&current, &siblings, placement, requested)?;

            let role = NewRole::new(name, current.category_id).with_optional_weight(weight);
            role.validate()?;

            match self.store.insert_role(role).await {
                Ok(created) => {
                    info!(
                        id = %created.id,
                        role = %created,
                        reference = %current,
                        ?placement,
                        weight = ?created.weight,
                        "Role interpolated"
                    );
                    return Ok(created);
                }
                Err(e) if e.is_retryable() && attempt < self.max_insert_attempts => {
                    warn!(
                        attempt,
                        max_attempts = self.max_insert_attempts,
                        error = %e,
                        "Weight collision while interpolating, recomputing"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn compare_roles(&self, x: &Role, y: &Role) -> Result<RankOrdering> {
        let tree = self.cached_tree(false).await?;
        Ranker::new(&tree).compare(x, y)
    }

    // ========================================================================
    // Users
    // ========================================================================

    pub async fn user_authority(&self, user_id: UserId) -> Result<UserAuthority> {
        self.authority_covering(user_id, None).await
    }

    /// Current snapshot, refreshed once if it predates any of `categories`
    /// (another service sharing the store may have added them since).
    async fn snapshot_covering(
        &self,
        categories: impl IntoIterator<Item = CategoryId>,
    ) -> Result<Arc<CategoryTree>> {
        let tree = self.cached_tree(false).await?;
        let missing = categories.into_iter().find(|id| !tree.contains(*id));
        match missing {
            Some(id) => {
                debug!(category_id = %id, "Snapshot predates a category in use, refreshing");
                self.cached_tree(true).await
            }
            None => Ok(tree),
        }
    }

    async fn authority_covering(
        &self,
        user_id: UserId,
        also: Option<CategoryId>,
    ) -> Result<UserAuthority> {
        let roles = self.store.roles_of_user(user_id).await?;
        let tree = self
            .snapshot_covering(roles.iter().map(|r| r.category_id).chain(also))
            .await?;
        debug!(user_id = %user_id, roles = roles.len(), "Loaded user authority");
        Ok(UserAuthority::new(user_id, roles, tree))
    }

    /// Both users bound to one snapshot covering all of their roles.
    async fn authority_pair(
        &self,
        user_id: UserId,
        other: UserId,
        also: Option<CategoryId>,
    ) -> Result<(UserAuthority, UserAuthority)> {
        let mine = self.store.roles_of_user(user_id).await?;
        let theirs = self.store.roles_of_user(other).await?;
        let tree = self
            .snapshot_covering(mine.iter().chain(&theirs).map(|r| r.category_id).chain(also))
            .await?;
        Ok((
            UserAuthority::new(user_id, mine, Arc::clone(&tree)),
            UserAuthority::new(other, theirs, tree),
        ))
    }

    pub async fn assign_role(&self, user_id: UserId, role_id: RoleId) -> Result<bool> {
        let added = self.store.assign_role(user_id, role_id).await?;
        if added {
            info!(user_id = %user_id, role_id = %role_id, "Role assigned");
        }
        Ok(added)
    }

    pub async fn revoke_role(&self, user_id: UserId, role_id: RoleId) -> Result<bool> {
        let removed = self.store.revoke_role(user_id, role_id).await?;
        if removed {
            info!(user_id = %user_id, role_id = %role_id, "Role revoked");
        }
        Ok(removed)
    }

    /// Whether any of the user's roles qualifies as `target`. An unknown
    /// role name is simply not qualified for; an ambiguous one is an error.
    pub async fn qualified_as(
        &self,
        user_id: UserId,
        target: RoleTarget<'_>,
        category: Option<CategoryId>,
    ) -> Result<bool> {
        let resolved = match target {
            RoleTarget::Role(role) => role.clone(),
            RoleTarget::Name(name) => {
                let candidates = self.store.find_roles_by_name(name).await?;
                match resolve_role_name(&candidates, name, category)? {
                    Some(role) => role,
                    None => {
                        debug!(name, "No role matches, not qualified");
                        return Ok(false);
                    }
                }
            }
        };
        self.authority_covering(user_id, Some(resolved.category_id))
            .await?
            .qualified_as(&resolved)
    }

    async fn qualified_in_default_category(&self, user_id: UserId, name: &str) -> Result<bool> {
        let category = match self.category(&self.well_known.default_category).await {
            Ok(category) => category,
            Err(AuthzError::NotFound { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };
        self.qualified_as(user_id, RoleTarget::Name(name), Some(category.id)).await
    }

    pub async fn is_moderator(&self, user_id: UserId) -> Result<bool> {
        self.qualified_in_default_category(user_id, &self.well_known.moderator).await
    }

    pub async fn is_editor(&self, user_id: UserId) -> Result<bool> {
        self.qualified_in_default_category(user_id, &self.well_known.editor).await
    }

    pub async fn is_an_admin(&self, user_id: UserId) -> Result<bool> {
        Ok(self.user_authority(user_id).await?.is_an_admin())
    }

    pub async fn is_sysadmin(&self, user_id: UserId) -> Result<bool> {
        self.qualified_as(user_id, RoleTarget::Name(&self.well_known.sysadmin), None).await
    }

    pub async fn abs_superior_to(&self, user_id: UserId, other: UserId) -> Result<bool> {
        let (me, them) = self.authority_pair(user_id, other, None).await?;
        me.abs_superior_to(&them)
    }

    pub async fn superior_to(
        &self,
        user_id: UserId,
        other: UserId,
        category: Option<CategoryId>,
    ) -> Result<bool> {
        let (me, them) = self.authority_pair(user_id, other, category).await?;
        me.superior_to(&them, category)
    }

    pub async fn highest_role_in(&self, user_id: UserId, category: CategoryId) -> Result<Option<Role>> {
        let authority = self.authority_covering(user_id, Some(category)).await?;
        Ok(authority.highest_role_in(category)?.cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRoleStore;

    async fn service() -> (AuthorityService, RoleCategory) {
        let service = AuthorityService::new(Arc::new(MemoryRoleStore::new()));
        let root = service.add_category(NewCategory::root()).await.unwrap();
        let sales = service
            .add_category(NewCategory::under("sales", root.id))
            .await
            .unwrap();
        (service, sales)
    }

    #[tokio::test]
    async fn test_add_category_publishes_new_tree() {
        let (service, sales) = service().await;
        let generation = service.cache().generation();

        service
            .add_category(NewCategory::under("emea", sales.id))
            .await
            .unwrap();

        assert_eq!(service.cache().generation(), generation + 1);
        let tree = service.cached_tree(false).await.unwrap();
        let emea = service.category("emea").await.unwrap();
        assert_eq!(tree.get(emea.id).and_then(|c| c.superior_id), Some(sales.id));
        assert!(service.root_category().await.unwrap().is_root());
    }

    #[tokio::test]
    async fn test_unknown_category_is_not_found() {
        let (service, _) = service().await;
        assert!(matches!(
            service.category("nowhere").await,
            Err(AuthzError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_subordinate_requires_persisted_reference() {
        let (service, sales) = service().await;
        let ghost = NewRole::new("ghost", sales.id)
            .with_weight(10.0)
            .into_role(RoleId(404));

        let err = service.create_subordinate(&ghost, "clerk", None).await.unwrap_err();
        assert!(matches!(err, AuthzError::Precondition { .. }));
    }

    #[tokio::test]
    async fn test_create_superior_steps_above_top() {
        let (service, sales) = service().await;
        let lead = service
            .add_role(NewRole::new("lead", sales.id).with_weight(10.0))
            .await
            .unwrap();

        let head = service.create_superior(&lead, "head", None).await.unwrap();
        assert_eq!(head.weight, Some(-90.0));
        assert_eq!(
            service.compare_roles(&head, &lead).await.unwrap(),
            RankOrdering::Less
        );
    }

    #[tokio::test]
    async fn test_requested_weight_outside_window_is_replaced() {
        let (service, sales) = service().await;
        let lead = service
            .add_role(NewRole::new("lead", sales.id).with_weight(10.0))
            .await
            .unwrap();
        service
            .add_role(NewRole::new("clerk", sales.id).with_weight(20.0))
            .await
            .unwrap();

        let honoured = service.create_subordinate(&lead, "deputy", Some(12.0)).await.unwrap();
        assert_eq!(honoured.weight, Some(12.0));

        let replaced = service.create_subordinate(&lead, "aide", Some(50.0)).await.unwrap();
        assert_eq!(replaced.weight, Some(11.0));
    }

    #[tokio::test]
    async fn test_unknown_names_are_not_qualified() {
        let (service, sales) = service().await;
        let clerk = service
            .add_role(NewRole::new("clerk", sales.id).with_weight(100.0))
            .await
            .unwrap();
        let user = UserId(1);
        service.assign_role(user, clerk.id).await.unwrap();

        assert!(!service
            .qualified_as(user, RoleTarget::Name("nobody"), None)
            .await
            .unwrap());
        assert!(service
            .qualified_as(user, RoleTarget::Name("clerk"), Some(sales.id))
            .await
            .unwrap());
        // no default category in this tree
        assert!(!service.is_moderator(user).await.unwrap());
    }
}
