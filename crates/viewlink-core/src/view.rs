//! Collaborator contracts consumed by a link.
//!
//! A link never owns its view, its collection, or the database. It reaches
//! them through these traits, which storage engines implement:
//!
//! - [`View`]: receives forwarded mutations and keeps the registry of links
//! - [`Collection`]: the document collection a link indexes
//! - [`Database`]: resolves view ids within a collection's scope
//! - [`Transaction`]: opaque handle carried through to the view

use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::ids::{CollectionId, LinkId, RevisionId, TransactionId, ViewId};
use crate::meta::LinkMeta;

/// A caller-supplied transaction. Commit and visibility belong to the engine.
pub trait Transaction: Send + Sync {
    fn id(&self) -> TransactionId;
}

/// A document batch for bulk loading: `(revision, document)` pairs.
pub type Batch = [(RevisionId, Value)];

/// What a view learns about a link when it registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkRegistration {
    pub link: LinkId,
    /// `None` when the link was created without a collection.
    pub collection: Option<CollectionId>,
}

/// An indexing view that links forward their collection's mutations to.
///
/// Views own the link registry. [`register_link`](Self::register_link) and
/// [`unregister_link`](Self::unregister_link) are the only mutators of the
/// link/view relation.
pub trait View: Send + Sync {
    fn id(&self) -> ViewId;

    /// Type tag; links only bind to views reporting
    /// [`SEARCH_VIEW_TYPE`](crate::definition::SEARCH_VIEW_TYPE).
    fn view_type(&self) -> &str;

    /// Index one document revision.
    ///
    /// # Errors
    ///
    /// Any failure the view wants reported to the caller, returned unmodified.
    fn insert(
        &self,
        trx: &dyn Transaction,
        collection: CollectionId,
        revision: RevisionId,
        document: &Value,
        meta: &LinkMeta,
    ) -> Result<()>;

    /// Index a batch of revisions in one call.
    ///
    /// # Errors
    ///
    /// Any failure the view wants reported to the caller.
    fn insert_batch(
        &self,
        trx: &dyn Transaction,
        collection: CollectionId,
        batch: &Batch,
        meta: &LinkMeta,
    ) -> Result<()>;

    /// Remove the entry keyed by collection and revision.
    ///
    /// # Errors
    ///
    /// Any failure the view wants reported to the caller.
    fn remove(
        &self,
        trx: &dyn Transaction,
        collection: CollectionId,
        revision: RevisionId,
    ) -> Result<()>;

    /// Drop everything indexed for a collection, including its link registrations.
    ///
    /// # Errors
    ///
    /// Any failure the view wants reported to the caller.
    fn drop_collection(&self, collection: CollectionId) -> Result<()>;

    /// Accept a link. Returns `false` if the view refuses, for example a
    /// duplicate registration or a view that is shutting down.
    fn register_link(&self, registration: LinkRegistration) -> bool;

    /// Forget a link. Returns `false` if it was not registered.
    fn unregister_link(&self, link: LinkId) -> bool;

    /// Total memory attributed to the view, in bytes.
    fn memory(&self) -> usize;

    /// Number of links currently registered.
    fn link_count(&self) -> usize;
}

/// Resolves views by id.
pub trait Database: Send + Sync {
    /// Look up a view. Type checking is left to the caller.
    fn lookup_view(&self, id: ViewId) -> Option<Arc<dyn View>>;
}

/// The collection a link belongs to.
pub trait Collection: Send + Sync {
    fn id(&self) -> CollectionId;

    /// The owning database, if it is still reachable.
    fn database(&self) -> Option<Arc<dyn Database>>;
}
