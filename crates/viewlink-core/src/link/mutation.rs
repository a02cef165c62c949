//! Forwarding of document mutations to the bound view.
//!
//! Every operation needs a live collection and a bound view; without them it
//! fails with [`LinkError::CollectionNotLoaded`] and forwards nothing. The
//! view's own status is passed back unmodified.

use std::sync::Arc;

use serde_json::Value;

use super::Link;
use crate::error::{LinkError, Result};
use crate::ids::RevisionId;
use crate::queue::TaskQueue;
use crate::view::{Batch, Collection, Transaction, View};

impl Link {
    /// Index one document revision in the bound view.
    ///
    /// `is_rollback` is accepted for parity with other index kinds; the view
    /// handles rollback through the transaction.
    ///
    /// # Errors
    ///
    /// - [`LinkError::CollectionNotLoaded`] if the collection or view is gone
    /// - [`LinkError::BadParameter`] if `trx` is `None`
    /// - whatever the view reports
    pub fn insert(
        &self,
        trx: Option<&dyn Transaction>,
        revision: RevisionId,
        document: &Value,
        is_rollback: bool,
    ) -> Result<()> {
        let (collection, view) = self.targets()?;
        let trx = trx.ok_or_else(|| self.missing_transaction())?;
        tracing::trace!(link = %self.id, %revision, is_rollback, "forwarding insert");
        view.insert(trx, collection.id(), revision, document, &self.meta)
    }

    /// Remove a document revision from the bound view.
    ///
    /// Removal is keyed by collection and revision; `document` is not consulted.
    ///
    /// # Errors
    ///
    /// Same as [`insert`](Self::insert).
    pub fn remove(
        &self,
        trx: Option<&dyn Transaction>,
        revision: RevisionId,
        _document: &Value,
        is_rollback: bool,
    ) -> Result<()> {
        let (collection, view) = self.targets()?;
        let trx = trx.ok_or_else(|| self.missing_transaction())?;
        tracing::trace!(link = %self.id, %revision, is_rollback, "forwarding remove");
        view.remove(trx, collection.id(), revision)
    }

    /// Forward a whole batch to the view in one call.
    ///
    /// Batches run as queue tasks with no return channel, so every failure
    /// is written to `queue` instead of being returned. The queue keeps the
    /// first failure.
    ///
    /// # Panics
    ///
    /// Panics if `queue` is `None`: the orchestrator was built without a
    /// status sink and failures would be lost.
    pub fn batch_insert(
        &self,
        trx: Option<&dyn Transaction>,
        batch: &Batch,
        queue: Option<&TaskQueue>,
    ) {
        let Some(queue) = queue else {
            panic!(
                "failed to report status during batch insert for link '{}'",
                self.id
            );
        };

        let (collection, view) = match self.targets() {
            Ok(targets) => targets,
            Err(err) => {
                queue.set_status(err);
                return;
            }
        };
        let Some(trx) = trx else {
            queue.set_status(self.missing_transaction());
            return;
        };

        tracing::trace!(link = %self.id, documents = batch.len(), "forwarding batch");
        if let Err(err) = view.insert_batch(trx, collection.id(), batch, &self.meta) {
            tracing::debug!(link = %self.id, error = %err, "batch insert failed");
            queue.set_status(err);
        }
    }

    /// Ask the view to drop everything indexed for this link's collection.
    ///
    /// # Errors
    ///
    /// - [`LinkError::CollectionNotLoaded`] if the collection or view is gone
    /// - whatever the view reports
    pub fn drop_data(&self) -> Result<()> {
        let (collection, view) = self.targets()?;
        view.drop_collection(collection.id())
    }

    fn targets(&self) -> Result<(Arc<dyn Collection>, Arc<dyn View>)> {
        match (self.collection(), self.bound_view()) {
            (Some(collection), Some(view)) => Ok((collection, view)),
            _ => Err(LinkError::CollectionNotLoaded(format!(
                "link '{}' requires a loaded collection and view",
                self.id
            ))),
        }
    }

    fn missing_transaction(&self) -> LinkError {
        LinkError::BadParameter(format!("link '{}' requires a transaction", self.id))
    }
}
