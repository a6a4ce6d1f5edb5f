//! Atomic batches of saves and deletes
//!
//! A batch is staged against the store as it stands when the batch takes
//! the commit lock, with later operations seeing the effects of earlier
//! ones. Staging either produces the complete change list of one commit or
//! fails without touching anything. The commit itself is a single WAL
//! record and a single store apply.

use std::collections::HashMap;
use std::sync::Arc;

use vellum_core::{validate_id, Document, Error, Result, Revision};
use vellum_storage::{Change, DocumentStore};

/// One mutation of a batch
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    /// Insert or fully replace a document
    Save(Document),
    /// Remove a document; fails the batch if the id does not exist
    Delete(String),
}

impl BatchOp {
    /// Save operation
    pub fn save(doc: Document) -> Self {
        BatchOp::Save(doc)
    }

    /// Delete operation
    pub fn delete(id: impl Into<String>) -> Self {
        BatchOp::Delete(id.into())
    }

    /// Id of the document this operation touches
    pub fn id(&self) -> &str {
        match self {
            BatchOp::Save(doc) => doc.id(),
            BatchOp::Delete(id) => id,
        }
    }
}

/// Ordered list of mutations committed together
///
/// ```ignore
/// db.in_batch(|batch| {
///     batch.save(Document::new("a").with("n", 1));
///     batch.delete("b");
///     Ok(())
/// })?;
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    /// Empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a save
    pub fn save(&mut self, doc: Document) -> &mut Self {
        self.ops.push(BatchOp::Save(doc));
        self
    }

    /// Queue a delete
    pub fn delete(&mut self, id: impl Into<String>) -> &mut Self {
        self.ops.push(BatchOp::Delete(id.into()));
        self
    }

    /// Queue an operation
    pub fn push(&mut self, op: BatchOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    /// Queued operations in order
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Number of queued operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl Extend<BatchOp> for Batch {
    fn extend<I: IntoIterator<Item = BatchOp>>(&mut self, iter: I) {
        self.ops.extend(iter);
    }
}

impl FromIterator<BatchOp> for Batch {
    fn from_iter<I: IntoIterator<Item = BatchOp>>(iter: I) -> Self {
        Batch {
            ops: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Batch {
    type Item = BatchOp;
    type IntoIter = std::vec::IntoIter<BatchOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

/// Changes of one commit, ready to be logged and applied
#[derive(Debug, Default)]
pub(crate) struct StagedCommit {
    pub(crate) changes: Vec<Change>,
    pub(crate) written: usize,
    pub(crate) deleted: usize,
}

impl StagedCommit {
    /// Commit made of schema changes only
    pub(crate) fn from_changes(changes: Vec<Change>) -> Self {
        StagedCommit {
            changes,
            ..Self::default()
        }
    }
}

/// Validate `ops` against `store` and stamp saved documents with
/// `revision`.
///
/// A delete must name a document that exists in the store or was saved
/// earlier in the same batch and not deleted since.
pub(crate) fn stage<I>(ops: I, store: &DocumentStore, revision: Revision) -> Result<StagedCommit>
where
    I: IntoIterator<Item = BatchOp>,
{
    let mut staged = StagedCommit::default();
    // id -> live after the ops staged so far
    let mut overlay: HashMap<String, bool> = HashMap::new();

    for (position, op) in ops.into_iter().enumerate() {
        validate_id(op.id()).map_err(|e| at_position(position, e))?;
        match op {
            BatchOp::Save(doc) => {
                overlay.insert(doc.id().to_string(), true);
                staged
                    .changes
                    .push(Change::Put(Arc::new(doc.at_revision(revision))));
                staged.written += 1;
            }
            BatchOp::Delete(id) => {
                let live = match overlay.get(&id) {
                    Some(live) => *live,
                    None => store.contains(&id),
                };
                if !live {
                    return Err(Error::not_found(id));
                }
                overlay.insert(id.clone(), false);
                staged.changes.push(Change::Delete(id));
                staged.deleted += 1;
            }
        }
    }
    Ok(staged)
}

fn at_position(position: usize, error: Error) -> Error {
    match error {
        Error::InvalidInput(msg) => Error::InvalidInput(format!("operation {}: {}", position, msg)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(ids: &[&str]) -> DocumentStore {
        let store = DocumentStore::new();
        let changes = ids
            .iter()
            .map(|id| Change::Put(Arc::new(Document::new(*id).at_revision(Revision::new(1)))))
            .collect();
        store.apply(changes, Revision::new(1));
        store
    }

    #[test]
    fn stamps_every_save_with_the_commit_revision() {
        let store = store_with(&[]);
        let mut batch = Batch::new();
        batch
            .save(Document::new("a"))
            .save(Document::new("b").at_revision(Revision::new(99)));
        let staged = stage(batch, &store, Revision::new(5)).unwrap();
        assert_eq!(staged.written, 2);
        for change in &staged.changes {
            match change {
                Change::Put(doc) => assert_eq!(doc.revision(), Some(Revision::new(5))),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn delete_sees_earlier_ops_of_the_batch() {
        let store = store_with(&["x"]);
        let ops = vec![
            BatchOp::save(Document::new("new")),
            BatchOp::delete("new"),
            BatchOp::delete("x"),
        ];
        let staged = stage(ops, &store, Revision::new(2)).unwrap();
        assert_eq!(staged.deleted, 2);

        let twice = vec![BatchOp::delete("x"), BatchOp::delete("x")];
        assert!(stage(twice, &store, Revision::new(2))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn unknown_delete_and_bad_id_fail() {
        let store = store_with(&[]);
        let err = stage(vec![BatchOp::delete("ghost")], &store, Revision::new(1)).unwrap_err();
        assert!(err.is_not_found());

        let ops = vec![BatchOp::save(Document::new("ok")), BatchOp::save(Document::new(""))];
        let err = stage(ops, &store, Revision::new(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(ref m) if m.starts_with("operation 1")));
    }

    #[test]
    fn batch_collects_from_iterators() {
        let batch: Batch = (0..3)
            .map(|i| BatchOp::save(Document::new(i.to_string())))
            .collect();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.ops()[2].id(), "2");
        assert!(!batch.is_empty());
    }
}
