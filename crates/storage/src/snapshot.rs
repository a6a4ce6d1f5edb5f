//! Point-in-time read views
//!
//! A snapshot holds `Arc` handles to the documents visible when it was
//! taken. Taking one costs a read lock plus one refcount bump per document;
//! documents themselves are never copied. Later writes replace the `Arc`s
//! in the store and are invisible to an existing snapshot.

use std::sync::Arc;

use vellum_core::{Document, Revision};

/// Immutable set of documents as of one revision, ordered by id
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    revision: Revision,
    docs: Arc<[Arc<Document>]>,
}

impl DocumentSnapshot {
    /// Wrap documents already sorted by id
    pub fn new(revision: Revision, docs: Vec<Arc<Document>>) -> Self {
        debug_assert!(docs.windows(2).all(|w| w[0].id() < w[1].id()));
        DocumentSnapshot {
            revision,
            docs: docs.into(),
        }
    }

    /// Revision the snapshot was taken at
    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Documents in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Document>> + '_ {
        self.docs.iter()
    }

    /// Document at position `i`
    pub fn get(&self, i: usize) -> Option<&Arc<Document>> {
        self.docs.get(i)
    }

    /// Number of documents
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Whether the snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}
