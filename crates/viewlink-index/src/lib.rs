//! # viewlink-index
//!
//! SQLite-backed reference view for viewlink.
//!
//! [`SqliteView`] implements the [`View`] contract: it stores, per collection
//! and revision, the projection of each forwarded document onto the link's
//! indexed fields. It keeps the registry of links bound to it.
//! [`Catalog`] resolves views by id for the collections it hands out.

mod catalog;
mod transaction;

use std::collections::BTreeMap;
use std::mem::size_of;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use viewlink_core::definition::SEARCH_VIEW_TYPE;
use viewlink_core::{
    Batch, CollectionId, LinkError, LinkId, LinkMeta, LinkRegistration, RevisionId, Transaction,
    View, ViewId,
};

pub use catalog::{Catalog, CatalogCollection};
pub use transaction::WriteTransaction;

/// A search view persisted in a SQLite database.
pub struct SqliteView {
    id: ViewId,
    conn: Mutex<Connection>,
    links: Mutex<BTreeMap<LinkId, LinkRegistration>>,
    closed: AtomicBool,
}

impl SqliteView {
    /// Open or create a view database at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::View`] if the database cannot be opened.
    pub fn open(id: ViewId, path: &Path) -> Result<Self, LinkError> {
        let conn = Connection::open(path).map_err(view_error)?;
        Self::with_connection(id, conn)
    }

    /// Create an in-memory view (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::View`] if schema creation fails.
    pub fn in_memory(id: ViewId) -> Result<Self, LinkError> {
        let conn = Connection::open_in_memory().map_err(view_error)?;
        Self::with_connection(id, conn)
    }

    fn with_connection(id: ViewId, conn: Connection) -> Result<Self, LinkError> {
        let view = Self {
            id,
            conn: Mutex::new(conn),
            links: Mutex::new(BTreeMap::new()),
            closed: AtomicBool::new(false),
        };
        view.create_schema()?;
        Ok(view)
    }

    fn create_schema(&self) -> Result<(), LinkError> {
        self.conn()?
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS entries (
                collection_id INTEGER NOT NULL,
                revision_id INTEGER NOT NULL,
                trx_id INTEGER NOT NULL,
                projection TEXT NOT NULL,
                projection_hash TEXT NOT NULL,
                indexed_at TEXT NOT NULL,
                PRIMARY KEY (collection_id, revision_id)
            );

            CREATE INDEX IF NOT EXISTS idx_entries_trx ON entries(trx_id);
            ",
            )
            .map_err(view_error)?;

        Ok(())
    }

    /// Refuse all further link registrations. Existing links stay registered.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Number of entries indexed for a collection.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::View`] if the query fails.
    pub fn count(&self, collection: CollectionId) -> Result<u64, LinkError> {
        let count: i64 = self
            .conn()?
            .query_row(
                "SELECT COUNT(*) FROM entries WHERE collection_id = ?1",
                params![sql_id(collection.get())],
                |row| row.get(0),
            )
            .map_err(view_error)?;
        Ok(count as u64)
    }

    /// Fetch one indexed entry.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::View`] if the query fails or the stored
    /// projection is not valid JSON.
    pub fn entry(
        &self,
        collection: CollectionId,
        revision: RevisionId,
    ) -> Result<Option<IndexedEntry>, LinkError> {
        let row = self
            .conn()?
            .query_row(
                "SELECT trx_id, projection, projection_hash, indexed_at
                 FROM entries
                 WHERE collection_id = ?1 AND revision_id = ?2",
                params![sql_id(collection.get()), sql_id(revision.get())],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(view_error)?;

        row.map(|(trx, projection, projection_hash, indexed_at)| {
            let projection = serde_json::from_str(&projection)
                .map_err(|e| LinkError::View(e.to_string()))?;
            Ok::<_, LinkError>(IndexedEntry {
                trx: trx as u64,
                projection,
                projection_hash,
                indexed_at,
            })
        })
        .transpose()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, LinkError> {
        self.conn
            .lock()
            .map_err(|_| LinkError::Internal(format!("view '{}' connection poisoned", self.id)))
    }

    fn links(&self) -> MutexGuard<'_, BTreeMap<LinkId, LinkRegistration>> {
        self.links.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

const UPSERT_ENTRY: &str = "INSERT OR REPLACE INTO entries
    (collection_id, revision_id, trx_id, projection, projection_hash, indexed_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

impl View for SqliteView {
    fn id(&self) -> ViewId {
        self.id
    }

    fn view_type(&self) -> &str {
        SEARCH_VIEW_TYPE
    }

    fn insert(
        &self,
        trx: &dyn Transaction,
        collection: CollectionId,
        revision: RevisionId,
        document: &Value,
        meta: &LinkMeta,
    ) -> Result<(), LinkError> {
        let entry = Projection::of(document, meta);
        self.conn()?
            .execute(
                UPSERT_ENTRY,
                params![
                    sql_id(collection.get()),
                    sql_id(revision.get()),
                    sql_id(trx.id().get()),
                    entry.json,
                    entry.hash,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(view_error)?;
        Ok(())
    }

    fn insert_batch(
        &self,
        trx: &dyn Transaction,
        collection: CollectionId,
        batch: &Batch,
        meta: &LinkMeta,
    ) -> Result<(), LinkError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(view_error)?;
        {
            let mut stmt = tx.prepare_cached(UPSERT_ENTRY).map_err(view_error)?;
            let indexed_at = Utc::now().to_rfc3339();
            for (revision, document) in batch {
                let entry = Projection::of(document, meta);
                stmt.execute(params![
                    sql_id(collection.get()),
                    sql_id(revision.get()),
                    sql_id(trx.id().get()),
                    entry.json,
                    entry.hash,
                    indexed_at,
                ])
                .map_err(view_error)?;
            }
        }
        tx.commit().map_err(view_error)?;
        tracing::debug!(view = %self.id, %collection, documents = batch.len(), "indexed batch");
        Ok(())
    }

    fn remove(
        &self,
        _trx: &dyn Transaction,
        collection: CollectionId,
        revision: RevisionId,
    ) -> Result<(), LinkError> {
        self.conn()?
            .execute(
                "DELETE FROM entries WHERE collection_id = ?1 AND revision_id = ?2",
                params![sql_id(collection.get()), sql_id(revision.get())],
            )
            .map_err(view_error)?;
        Ok(())
    }

    fn drop_collection(&self, collection: CollectionId) -> Result<(), LinkError> {
        self.conn()?
            .execute(
                "DELETE FROM entries WHERE collection_id = ?1",
                params![sql_id(collection.get())],
            )
            .map_err(view_error)?;
        self.links()
            .retain(|_, reg| reg.collection != Some(collection));
        tracing::debug!(view = %self.id, %collection, "dropped collection");
        Ok(())
    }

    fn register_link(&self, registration: LinkRegistration) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            tracing::warn!(view = %self.id, link = %registration.link, "view is closed");
            return false;
        }
        let mut links = self.links();
        if links.contains_key(&registration.link) {
            return false;
        }
        links.insert(registration.link, registration);
        true
    }

    fn unregister_link(&self, link: LinkId) -> bool {
        self.links().remove(&link).is_some()
    }

    fn memory(&self) -> usize {
        let stored = self.conn().and_then(|conn| {
            conn.query_row(
                "SELECT COALESCE(SUM(LENGTH(projection)), 0) FROM entries",
                [],
                |row| row.get::<_, i64>(0),
            )
            .map_err(view_error)
        });

        match stored {
            Ok(bytes) => size_of::<Self>() + bytes as usize,
            Err(e) => {
                tracing::warn!(view = %self.id, error = %e, "failed to measure view");
                size_of::<Self>()
            }
        }
    }

    fn link_count(&self) -> usize {
        self.links().len()
    }
}

/// An entry as stored in the view.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedEntry {
    pub trx: u64,
    pub projection: Value,
    pub projection_hash: String,
    pub indexed_at: String,
}

/// The part of a document a link indexes.
struct Projection {
    json: String,
    hash: String,
}

impl Projection {
    fn of(document: &Value, meta: &LinkMeta) -> Self {
        let value = if meta.include_all_fields() {
            document.clone()
        } else {
            let mut fields = Map::new();
            if let Some(obj) = document.as_object() {
                for name in meta.field_names() {
                    if let Some(v) = obj.get(name) {
                        fields.insert(name.to_string(), v.clone());
                    }
                }
            }
            Value::Object(fields)
        };

        let json = value.to_string();
        let hash = format!("{:x}", Sha256::digest(json.as_bytes()));
        Self { json, hash }
    }
}

// SQLite integers are signed; ids round-trip through a bit-preserving cast.
fn sql_id(id: u64) -> i64 {
    id as i64
}

fn view_error(e: rusqlite::Error) -> LinkError {
    LinkError::View(e.to_string())
}
