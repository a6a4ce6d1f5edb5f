//! DocumentStore: in-memory document map with secondary indexes
//!
//! - `BTreeMap<String, Arc<Document>>` keeps documents ordered by id, which
//!   is the order every scan and query returns them in
//! - `parking_lot::RwLock` guards documents, indexes and the revision
//!   together, so a commit is applied under a single write lock and readers
//!   see all of it or none of it
//! - Field indexes are maintained inside the same lock as the documents
//!
//! The store does no I/O and allocates no revisions; the engine logs a
//! commit durably first and then applies it here.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use vellum_core::{Document, FieldPath, Revision, Value, ValueKind};

use crate::index::FieldIndex;
use crate::snapshot::DocumentSnapshot;

/// One state change of a commit
#[derive(Debug, Clone)]
pub enum Change {
    /// Insert or fully replace a document (already stamped with its revision)
    Put(Arc<Document>),
    /// Remove a document; absent ids are ignored
    Delete(String),
    /// Create an index and build it from the current documents
    DefineIndex(FieldPath),
    /// Drop an index
    DropIndex(FieldPath),
}

#[derive(Debug, Default)]
struct StoreState {
    docs: BTreeMap<String, Arc<Document>>,
    indexes: BTreeMap<String, FieldIndex>,
    revision: Revision,
}

impl StoreState {
    fn put(&mut self, doc: Arc<Document>) {
        if let Some(old) = self.docs.get(doc.id()) {
            for index in self.indexes.values_mut() {
                index.remove(old);
            }
        }
        for index in self.indexes.values_mut() {
            index.insert(&doc);
        }
        self.docs.insert(doc.id().to_string(), doc);
    }

    fn delete(&mut self, id: &str) {
        if let Some(old) = self.docs.remove(id) {
            for index in self.indexes.values_mut() {
                index.remove(&old);
            }
        }
    }

    fn define_index(&mut self, path: FieldPath) {
        let name = path.to_string();
        if self.indexes.contains_key(&name) {
            return;
        }
        let mut index = FieldIndex::new(path);
        for doc in self.docs.values() {
            index.insert(doc);
        }
        self.indexes.insert(name, index);
    }
}

/// Everything needed to write a compaction snapshot, read atomically
#[derive(Debug, Clone)]
pub struct StoreCheckpoint {
    /// Highest applied revision
    pub revision: Revision,
    /// Live documents in id order
    pub documents: Vec<Arc<Document>>,
    /// Defined index paths
    pub indexes: Vec<FieldPath>,
}

/// Thread-safe in-memory document store
#[derive(Debug, Default)]
pub struct DocumentStore {
    state: RwLock<StoreState>,
}

impl DocumentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply all changes of one commit atomically.
    ///
    /// `revision` becomes the store revision if it is higher than the
    /// current one.
    pub fn apply(&self, changes: Vec<Change>, revision: Revision) {
        let mut state = self.state.write();
        let count = changes.len();
        for change in changes {
            match change {
                Change::Put(doc) => state.put(doc),
                Change::Delete(id) => state.delete(&id),
                Change::DefineIndex(path) => state.define_index(path),
                Change::DropIndex(path) => {
                    state.indexes.remove(&path.to_string());
                }
            }
        }
        if revision > state.revision {
            state.revision = revision;
        }
        trace!(target: "vellum::store", changes = count, %revision, "Applied commit");
    }

    /// Highest applied revision
    pub fn revision(&self) -> Revision {
        self.state.read().revision
    }

    /// Current revision of a document
    pub fn get(&self, id: &str) -> Option<Arc<Document>> {
        self.state.read().docs.get(id).cloned()
    }

    /// Whether a document exists
    pub fn contains(&self, id: &str) -> bool {
        self.state.read().docs.contains_key(id)
    }

    /// Number of documents
    pub fn len(&self) -> usize {
        self.state.read().docs.len()
    }

    /// Whether the store holds no documents
    pub fn is_empty(&self) -> bool {
        self.state.read().docs.is_empty()
    }

    /// All document ids, ascending
    pub fn ids(&self) -> Vec<String> {
        self.state.read().docs.keys().cloned().collect()
    }

    /// Snapshot of every document
    pub fn snapshot(&self) -> DocumentSnapshot {
        let state = self.state.read();
        DocumentSnapshot::new(state.revision, state.docs.values().cloned().collect())
    }

    /// Snapshot of the documents an index reports within the bounds.
    ///
    /// Returns `None` when `path` is not indexed or the index cannot
    /// answer exactly for a literal of `kind`; the caller then scans.
    pub fn probe(
        &self,
        path: &FieldPath,
        kind: ValueKind,
        lower: Bound<&Value>,
        upper: Bound<&Value>,
    ) -> Option<DocumentSnapshot> {
        let state = self.state.read();
        let index = state.indexes.get(&path.to_string())?;
        if !index.can_serve(kind) {
            return None;
        }
        let ids = index.range(lower, upper)?;
        let docs = ids
            .iter()
            .filter_map(|id| state.docs.get(id).cloned())
            .collect();
        Some(DocumentSnapshot::new(state.revision, docs))
    }

    /// Whether `path` is indexed
    pub fn has_index(&self, path: &FieldPath) -> bool {
        self.state.read().indexes.contains_key(&path.to_string())
    }

    /// Indexed paths, ordered by dotted name
    pub fn index_paths(&self) -> Vec<FieldPath> {
        self.state
            .read()
            .indexes
            .values()
            .map(|i| i.path().clone())
            .collect()
    }

    /// Consistent copy of documents, indexes and revision
    pub fn checkpoint(&self) -> StoreCheckpoint {
        let state = self.state.read();
        StoreCheckpoint {
            revision: state.revision,
            documents: state.docs.values().cloned().collect(),
            indexes: state.indexes.values().map(|i| i.path().clone()).collect(),
        }
    }

    /// Drop every document and index
    pub fn clear(&self) {
        *self.state.write() = StoreState::default();
    }
}
