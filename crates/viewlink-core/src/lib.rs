//! # viewlink-core
//!
//! Binding between per-collection links and the search views that index
//! their documents.
//!
//! This crate defines:
//! - [`Link`]: resolves and registers with a view, forwards mutations,
//!   matches candidate definitions, and serializes its binding
//! - [`LinkMeta`]: the indexed-field configuration owned by a link
//! - Collaborator traits ([`View`], [`Collection`], [`Database`], [`Transaction`])
//! - [`TaskQueue`]: the shared status sink for parallel batch inserts
//! - Error hierarchy ([`LinkError`], [`ErrorKind`])
//! - Definition document keys and builders ([`definition`])

pub mod definition;
pub mod error;
pub mod ids;
pub mod link;
pub mod meta;
pub mod queue;
pub mod view;

#[cfg(test)]
pub(crate) mod testing;

pub use definition::Definition;
pub use error::{ErrorKind, LinkError, Result};
pub use ids::{CollectionId, LinkId, RevisionId, TransactionId, ViewId};
pub use link::{enhance_definition, BindingState, Link};
pub use meta::LinkMeta;
pub use queue::TaskQueue;
pub use view::{Batch, Collection, Database, LinkRegistration, Transaction, View};
