//! Link: the per-collection index that binds to a view and forwards
//! document mutations to it.
//!
//! A link is created from a definition document by [`Link::make`] and ends
//! up in one of three binding states:
//!
//! - **Deferred**: the definition carried `skipViewRegistration: true`. An
//!   optional candidate view id is remembered and no lookup happens.
//!   A later [`Link::attach`] performs the registration.
//! - **Bound**: the view was resolved through the collection's database
//!   and accepted the link's registration.
//! - **Unbound**: a bound link was [`unload`](Link::unload)ed; the last
//!   view id is remembered for serialization.
//!
//! The link holds only weak references to its collection and view. Dropping
//! a `Link` never contacts the view; [`Link::unregister`] is the explicit
//! way to leave a view's registry.
//!
//! Resolving a view that is itself still under construction can deadlock
//! inside the database. Callers must either finish building the view first
//! or create the link deferred.

mod mutation;
mod reconcile;
mod state;

use std::sync::{Arc, Weak};

use serde_json::Value;

use crate::definition::{
    as_object, parse_view_id, skips_view_registration, LINK_TYPE, SEARCH_VIEW_TYPE,
    VIEW_ID_FIELD,
};
use crate::error::{LinkError, Result};
use crate::ids::{CollectionId, LinkId, ViewId};
use crate::meta::LinkMeta;
use crate::view::{Collection, LinkRegistration, View};

pub use state::enhance_definition;

/// Internal binding state. Only [`Link::attach`], [`Link::unload`] and
/// [`Link::unregister`] move between variants.
#[derive(Debug)]
enum Binding {
    Deferred { candidate: Option<ViewId> },
    Bound { id: ViewId, view: Weak<dyn View> },
    Unbound { remembered: Option<ViewId> },
}

/// Observable snapshot of a link's binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    Deferred(Option<ViewId>),
    Bound(ViewId),
    Unbound(Option<ViewId>),
}

/// An index on a collection whose data lives in a search view.
#[derive(Debug)]
pub struct Link {
    id: LinkId,
    collection: Option<Weak<dyn Collection>>,
    meta: LinkMeta,
    binding: Binding,
}

impl Link {
    /// Create a link from its definition and bind it as the definition asks.
    ///
    /// # Errors
    ///
    /// - [`LinkError::BadDefinition`] if the metadata does not parse
    /// - [`LinkError::BadParameter`] if a deferred definition carries a view
    ///   id that is not a non-negative integer
    /// - [`LinkError::ViewNotFound`] if no view id is given, the database is
    ///   unreachable, the view does not exist or has the wrong type, or the
    ///   view refuses the registration
    pub fn make(
        id: LinkId,
        collection: Option<&Arc<dyn Collection>>,
        definition: &Value,
    ) -> Result<Self> {
        let meta = LinkMeta::from_definition(definition).inspect_err(|e| {
            tracing::warn!(link = %id, error = %e, "error parsing link definition");
        })?;
        let fields = as_object(definition)?;

        let mut link = Self {
            id,
            collection: collection.map(Arc::downgrade),
            meta,
            binding: Binding::Unbound { remembered: None },
        };

        if skips_view_registration(fields) {
            let candidate = match fields.get(VIEW_ID_FIELD) {
                Some(raw) => Some(parse_view_id(raw).ok_or_else(|| {
                    tracing::warn!(link = %id, view = %raw, "error parsing view identifier");
                    LinkError::BadParameter(format!(
                        "invalid view identifier for link '{id}': {raw}"
                    ))
                })?),
                None => None,
            };
            link.binding = Binding::Deferred {
                candidate: candidate.and_then(ViewId::non_zero),
            };
            tracing::debug!(link = %id, ?candidate, "deferred view registration");
            return Ok(link);
        }

        let Some(view_id) = fields.get(VIEW_ID_FIELD).and_then(parse_view_id) else {
            tracing::warn!(link = %id, "link definition names no valid view");
            return Err(LinkError::ViewNotFound(format!(
                "no view identifier for link '{id}'"
            )));
        };

        let database = collection.and_then(|c| c.database()).ok_or_else(|| {
            tracing::warn!(link = %id, view = %view_id, "error finding database for link");
            LinkError::ViewNotFound(format!(
                "no database to resolve view '{view_id}' for link '{id}'"
            ))
        })?;

        let view = database.lookup_view(view_id).ok_or_else(|| {
            tracing::warn!(link = %id, view = %view_id, "error finding view for link");
            LinkError::ViewNotFound(format!("view '{view_id}' for link '{id}'"))
        })?;

        link.attach(&view)?;
        Ok(link)
    }

    /// Register with a view and bind to it.
    ///
    /// The link only considers itself bound once the view has accepted the
    /// registration.
    ///
    /// # Errors
    ///
    /// - [`LinkError::BadParameter`] if the link is already bound
    /// - [`LinkError::ViewNotFound`] if the view has the wrong type or
    ///   refuses the registration
    pub fn attach(&mut self, view: &Arc<dyn View>) -> Result<()> {
        if let Binding::Bound { id, .. } = self.binding {
            return Err(LinkError::BadParameter(format!(
                "link '{}' is already bound to view '{id}'",
                self.id
            )));
        }

        if view.view_type() != SEARCH_VIEW_TYPE {
            return Err(LinkError::ViewNotFound(format!(
                "view '{}' has type '{}', expected '{SEARCH_VIEW_TYPE}'",
                view.id(),
                view.view_type()
            )));
        }

        let registration = LinkRegistration {
            link: self.id,
            collection: self.collection().map(|c| c.id()),
        };
        if !view.register_link(registration) {
            tracing::warn!(link = %self.id, view = %view.id(), "view refused link registration");
            return Err(LinkError::ViewNotFound(format!(
                "view '{}' refused registration of link '{}'",
                view.id(),
                self.id
            )));
        }

        self.binding = Binding::Bound {
            id: view.id(),
            view: Arc::downgrade(view),
        };
        tracing::debug!(link = %self.id, view = %view.id(), "link bound to view");
        Ok(())
    }

    /// Release the view, remembering its id. Idempotent.
    pub fn unload(&mut self) {
        if let Binding::Bound { id, .. } = self.binding {
            tracing::debug!(link = %self.id, view = %id, "link unloaded");
            self.binding = Binding::Unbound {
                remembered: Some(id),
            };
        }
    }

    /// Leave the bound view's registry, then [`unload`](Self::unload).
    ///
    /// Returns whether the view acknowledged the unregistration.
    pub fn unregister(&mut self) -> bool {
        let acknowledged = self
            .bound_view()
            .is_some_and(|view| view.unregister_link(self.id));
        self.unload();
        acknowledged
    }

    /// Loading has nothing to restore; the view owns the indexed data.
    ///
    /// # Errors
    ///
    /// Never fails.
    pub fn load(&mut self) -> Result<()> {
        Ok(())
    }

    #[must_use]
    pub fn id(&self) -> LinkId {
        self.id
    }

    #[must_use]
    pub fn meta(&self) -> &LinkMeta {
        &self.meta
    }

    #[must_use]
    pub fn state(&self) -> BindingState {
        match &self.binding {
            Binding::Deferred { candidate } => BindingState::Deferred(*candidate),
            Binding::Bound { id, .. } => BindingState::Bound(*id),
            Binding::Unbound { remembered } => BindingState::Unbound(*remembered),
        }
    }

    /// The view id this link reports: the bound view's, else the remembered one.
    #[must_use]
    pub fn view_id(&self) -> Option<ViewId> {
        match self.binding {
            Binding::Bound { id, .. } => Some(id),
            Binding::Deferred { candidate } => candidate,
            Binding::Unbound { remembered } => remembered,
        }
    }

    #[must_use]
    pub fn is_bound_to(&self, view: ViewId) -> bool {
        matches!(self.binding, Binding::Bound { id, .. } if id == view)
    }

    #[must_use]
    pub fn collection_id(&self) -> Option<CollectionId> {
        self.collection().map(|c| c.id())
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        LINK_TYPE
    }

    /// Multiple fields are indexed, so a link is never unique.
    #[must_use]
    pub fn unique(&self) -> bool {
        false
    }

    #[must_use]
    pub fn sparse(&self) -> bool {
        true
    }

    /// Array values are indexed per element.
    #[must_use]
    pub fn allow_expansion(&self) -> bool {
        true
    }

    #[must_use]
    pub fn can_be_dropped(&self) -> bool {
        true
    }

    #[must_use]
    pub fn has_batch_insert(&self) -> bool {
        true
    }

    /// Selectivity depends on the query, not the link.
    #[must_use]
    pub fn has_selectivity_estimate(&self) -> bool {
        false
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        true
    }

    #[must_use]
    pub fn is_sorted(&self) -> bool {
        false
    }

    fn collection(&self) -> Option<Arc<dyn Collection>> {
        self.collection.as_ref().and_then(Weak::upgrade)
    }

    fn bound_view(&self) -> Option<Arc<dyn View>> {
        match &self.binding {
            Binding::Bound { view, .. } => view.upgrade(),
            _ => None,
        }
    }
}

impl PartialEq<LinkMeta> for Link {
    fn eq(&self, other: &LinkMeta) -> bool {
        self.meta == *other
    }
}
