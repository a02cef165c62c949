//! In-process view catalog.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use viewlink_core::{Collection, CollectionId, Database, View, ViewId};

/// Views registered by id. Implements [`Database`] for the collections it creates.
#[derive(Default)]
pub struct Catalog {
    views: RwLock<BTreeMap<ViewId, Arc<dyn View>>>,
}

impl Catalog {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add a view. Returns `false` if a view with the same id exists.
    pub fn add_view(&self, view: Arc<dyn View>) -> bool {
        let mut views = self.views.write().unwrap_or_else(PoisonError::into_inner);
        if views.contains_key(&view.id()) {
            return false;
        }
        tracing::debug!(view = %view.id(), view_type = view.view_type(), "view added to catalog");
        views.insert(view.id(), view);
        true
    }

    pub fn remove_view(&self, id: ViewId) -> Option<Arc<dyn View>> {
        self.views
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }

    #[must_use]
    pub fn view_ids(&self) -> Vec<ViewId> {
        self.views
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    /// A collection scoped to this catalog. It does not keep the catalog alive.
    #[must_use]
    pub fn collection(self: &Arc<Self>, id: CollectionId) -> Arc<dyn Collection> {
        Arc::new(CatalogCollection {
            id,
            catalog: Arc::downgrade(self),
        })
    }
}

impl Database for Catalog {
    fn lookup_view(&self, id: ViewId) -> Option<Arc<dyn View>> {
        self.views
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }
}

/// A collection whose database is a [`Catalog`].
pub struct CatalogCollection {
    id: CollectionId,
    catalog: Weak<Catalog>,
}

impl Collection for CatalogCollection {
    fn id(&self) -> CollectionId {
        self.id
    }

    fn database(&self) -> Option<Arc<dyn Database>> {
        self.catalog
            .upgrade()
            .map(|catalog| catalog as Arc<dyn Database>)
    }
}
