//! Category Tree Snapshot Cache
//!
//! Holds the materialized tree as an immutable snapshot behind an atomic
//! pointer. A refresh builds the replacement off to the side and publishes it
//! with a single swap, so readers see either the old tree or the new one.
//! Two writers refreshing at once may publish in either order; both trees are
//! built from committed rows, so the later swap is never stale by more than
//! one write.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use tracing::{debug, info};

use super::tree::CategoryTree;
use crate::error::Result;
use crate::store::RoleStore;

#[derive(Default)]
pub struct CategoryTreeCache {
    snapshot: ArcSwapOption<CategoryTree>,
    generation: AtomicU64,
}

impl CategoryTreeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot, built on first use.
    ///
    /// Readers never rebuild an existing snapshot unless `force_refresh` is set.
    pub async fn cached_tree(
        &self,
        store: &dyn RoleStore,
        force_refresh: bool,
    ) -> Result<Arc<CategoryTree>> {
        if !force_refresh {
            if let Some(tree) = self.snapshot.load_full() {
                return Ok(tree);
            }
            debug!("Category tree cache empty, building");
        }
        self.refresh(store).await
    }

    /// Rebuild from the store and publish the new snapshot.
    pub async fn refresh(&self, store: &dyn RoleStore) -> Result<Arc<CategoryTree>> {
        let categories = store.list_categories().await?;
        let tree = Arc::new(CategoryTree::build(categories)?);
        self.snapshot.store(Some(Arc::clone(&tree)));
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

        info!(
            categories = tree.len(),
            generation,
            backend = store.backend_name(),
            "Category tree refreshed"
        );
        Ok(tree)
    }

    /// Drop the snapshot; the next read rebuilds.
    pub fn invalidate(&self) {
        self.snapshot.store(None);
        debug!("Category tree cache invalidated");
    }

    /// Snapshot without touching the store.
    pub fn peek(&self) -> Option<Arc<CategoryTree>> {
        self.snapshot.load_full()
    }

    /// Number of snapshots published so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::entity::NewCategory;
    use crate::store::MemoryRoleStore;

    #[tokio::test]
    async fn test_lazy_build_then_reuse() {
        let store = MemoryRoleStore::new();
        store.insert_category(NewCategory::root()).await.unwrap();

        let cache = CategoryTreeCache::new();
        assert!(cache.peek().is_none());

        let first = cache.cached_tree(&store, false).await.unwrap();
        let second = cache.cached_tree(&store, false).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.generation(), 1);
    }

    #[tokio::test]
    async fn test_readers_do_not_see_writes_until_refresh() {
        let store = MemoryRoleStore::new();
        let root = store.insert_category(NewCategory::root()).await.unwrap();

        let cache = CategoryTreeCache::new();
        let before = cache.cached_tree(&store, false).await.unwrap();

        store
            .insert_category(NewCategory::under("sales", root.id))
            .await
            .unwrap();
        let stale = cache.cached_tree(&store, false).await.unwrap();
        assert_eq!(stale.len(), 1);

        let fresh = cache.cached_tree(&store, true).await.unwrap();
        assert_eq!(fresh.len(), 2);
        // the old snapshot is untouched
        assert_eq!(before.len(), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_rebuild() {
        let store = MemoryRoleStore::new();
        store.insert_category(NewCategory::root()).await.unwrap();

        let cache = CategoryTreeCache::new();
        let first = cache.cached_tree(&store, false).await.unwrap();
        cache.invalidate();
        assert!(cache.peek().is_none());
        let second = cache.cached_tree(&store, false).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.shape(), second.shape());
    }

    #[tokio::test]
    async fn test_empty_store_has_no_root() {
        let store = MemoryRoleStore::new();
        let cache = CategoryTreeCache::new();
        assert!(cache.cached_tree(&store, false).await.is_err());
    }
}
