//! Test doubles for the collaborator traits.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::definition::SEARCH_VIEW_TYPE;
use crate::error::{LinkError, Result};
use crate::ids::{CollectionId, LinkId, RevisionId, TransactionId, ViewId};
use crate::meta::LinkMeta;
use crate::view::{Batch, Collection, Database, LinkRegistration, Transaction, View};

pub struct TestTransaction(pub u64);

impl Transaction for TestTransaction {
    fn id(&self) -> TransactionId {
        TransactionId(self.0)
    }
}

/// A call forwarded to a [`RecordingView`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Insert {
        trx: TransactionId,
        collection: CollectionId,
        revision: RevisionId,
        document: Value,
    },
    InsertBatch {
        trx: TransactionId,
        collection: CollectionId,
        revisions: Vec<RevisionId>,
    },
    Remove {
        trx: TransactionId,
        collection: CollectionId,
        revision: RevisionId,
    },
    Drop {
        collection: CollectionId,
    },
}

pub struct RecordingView {
    id: ViewId,
    view_type: String,
    calls: Mutex<Vec<Call>>,
    links: Mutex<BTreeMap<LinkId, LinkRegistration>>,
    refuse: AtomicBool,
    failure: Mutex<Option<LinkError>>,
    memory: AtomicUsize,
}

impl RecordingView {
    pub fn search(id: u64) -> Self {
        Self::with_type(id, SEARCH_VIEW_TYPE)
    }

    pub fn with_type(id: u64, view_type: &str) -> Self {
        Self {
            id: ViewId(id),
            view_type: view_type.to_string(),
            calls: Mutex::new(Vec::new()),
            links: Mutex::new(BTreeMap::new()),
            refuse: AtomicBool::new(false),
            failure: Mutex::new(None),
            memory: AtomicUsize::new(0),
        }
    }

    pub fn refuse_registration(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Make every mutation return this error until cleared.
    pub fn fail_with(&self, error: Option<LinkError>) {
        *self.failure.lock().unwrap() = error;
    }

    pub fn set_memory(&self, bytes: usize) {
        self.memory.store(bytes, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn registrations(&self) -> Vec<LinkRegistration> {
        self.links.lock().unwrap().values().copied().collect()
    }

    fn record(&self, call: Call) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        match &*self.failure.lock().unwrap() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl View for RecordingView {
    fn id(&self) -> ViewId {
        self.id
    }

    fn view_type(&self) -> &str {
        &self.view_type
    }

    fn insert(
        &self,
        trx: &dyn Transaction,
        collection: CollectionId,
        revision: RevisionId,
        document: &Value,
        _meta: &LinkMeta,
    ) -> Result<()> {
        self.record(Call::Insert {
            trx: trx.id(),
            collection,
            revision,
            document: document.clone(),
        })
    }

    fn insert_batch(
        &self,
        trx: &dyn Transaction,
        collection: CollectionId,
        batch: &Batch,
        _meta: &LinkMeta,
    ) -> Result<()> {
        self.record(Call::InsertBatch {
            trx: trx.id(),
            collection,
            revisions: batch.iter().map(|(rev, _)| *rev).collect(),
        })
    }

    fn remove(
        &self,
        trx: &dyn Transaction,
        collection: CollectionId,
        revision: RevisionId,
    ) -> Result<()> {
        self.record(Call::Remove {
            trx: trx.id(),
            collection,
            revision,
        })
    }

    fn drop_collection(&self, collection: CollectionId) -> Result<()> {
        self.links
            .lock()
            .unwrap()
            .retain(|_, reg| reg.collection != Some(collection));
        self.record(Call::Drop { collection })
    }

    fn register_link(&self, registration: LinkRegistration) -> bool {
        if self.refuse.load(Ordering::SeqCst) {
            return false;
        }
        let mut links = self.links.lock().unwrap();
        if links.contains_key(&registration.link) {
            return false;
        }
        links.insert(registration.link, registration);
        true
    }

    fn unregister_link(&self, link: LinkId) -> bool {
        self.links.lock().unwrap().remove(&link).is_some()
    }

    fn memory(&self) -> usize {
        self.memory.load(Ordering::SeqCst)
    }

    fn link_count(&self) -> usize {
        self.links.lock().unwrap().len()
    }
}

/// A database that counts lookups.
pub struct TestDatabase {
    views: BTreeMap<ViewId, Arc<RecordingView>>,
    lookups: AtomicUsize,
}

impl TestDatabase {
    pub fn with_views(views: impl IntoIterator<Item = RecordingView>) -> Arc<Self> {
        Arc::new(Self {
            views: views
                .into_iter()
                .map(|v| (v.id, Arc::new(v)))
                .collect(),
            lookups: AtomicUsize::new(0),
        })
    }

    pub fn view(&self, id: u64) -> Arc<RecordingView> {
        Arc::clone(&self.views[&ViewId(id)])
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl Database for TestDatabase {
    fn lookup_view(&self, id: ViewId) -> Option<Arc<dyn View>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.views
            .get(&id)
            .map(|v| Arc::clone(v) as Arc<dyn View>)
    }
}

pub struct TestCollection {
    id: CollectionId,
    database: Option<Arc<dyn Database>>,
}

impl Collection for TestCollection {
    fn id(&self) -> CollectionId {
        self.id
    }

    fn database(&self) -> Option<Arc<dyn Database>> {
        self.database.clone()
    }
}

pub fn collection_with(id: u64, db: &Arc<TestDatabase>) -> Arc<dyn Collection> {
    Arc::new(TestCollection {
        id: CollectionId(id),
        database: Some(Arc::clone(db) as Arc<dyn Database>),
    })
}

/// A collection whose database is gone.
pub fn orphan_collection(id: u64) -> Arc<dyn Collection> {
    Arc::new(TestCollection {
        id: CollectionId(id),
        database: None,
    })
}

/// In-memory log sink for asserting on `tracing` output.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Run `f` with a warn-level subscriber writing into a fresh sink.
    pub fn during<R>(f: impl FnOnce() -> R) -> (R, String) {
        let logs = Self::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        let out = tracing::subscriber::with_default(subscriber, f);
        let text = String::from_utf8_lossy(&logs.0.lock().unwrap()).into_owned();
        (out, text)
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
