//! Translation between store changes and logged writesets
//!
//! A commit is logged as one writeset and applied to the store as a list
//! of [`Change`]s. Both directions live here so that what recovery replays
//! is exactly what the commit path wrote.

use std::sync::Arc;

use vellum_core::{Document, Error, FieldPath, Result, Revision};
use vellum_durability::format::MAX_WRITESET_SIZE;
use vellum_durability::{Mutation, Writeset, WritesetError};
use vellum_storage::Change;

/// Encode the changes of one commit.
///
/// Documents must already carry their commit revision.
pub(crate) fn encode_changes(changes: &[Change]) -> Result<Writeset> {
    let mut writeset = Writeset::with_capacity(changes.len());
    for change in changes {
        match change {
            Change::Put(doc) => {
                let revision = doc.revision().ok_or_else(|| {
                    Error::invalid_input(format!("document '{}' has no revision", doc.id()))
                })?;
                writeset.put(doc.id(), revision.as_u64(), doc.encode_body()?);
            }
            Change::Delete(id) => writeset.delete(id.as_str()),
            Change::DefineIndex(path) => writeset.define_index(path.to_string()),
            Change::DropIndex(path) => writeset.drop_index(path.to_string()),
        }
    }
    Ok(writeset)
}

/// Bytes of a writeset that one WAL record can carry.
///
/// Larger commits are refused with `InvalidInput` before anything is
/// written.
pub(crate) fn record_body(writeset: &Writeset) -> Result<Vec<u8>> {
    checked_body(writeset, MAX_WRITESET_SIZE)
}

fn checked_body(writeset: &Writeset, limit: usize) -> Result<Vec<u8>> {
    let too_large = |len: usize| {
        Error::invalid_input(format!(
            "commit of {} changes encodes to {} bytes, the limit is {}",
            writeset.len(),
            len,
            limit
        ))
    };
    let bytes = writeset.to_bytes().map_err(|e| match e {
        WritesetError::TooLarge { len } => too_large(len),
        other => Error::invalid_input(other.to_string()),
    })?;
    if bytes.len() > limit {
        return Err(too_large(bytes.len()));
    }
    Ok(bytes)
}

/// Decode a logged writeset back into store changes.
pub(crate) fn decode_writeset(writeset: Writeset) -> Result<Vec<Change>> {
    writeset
        .into_mutations()
        .into_iter()
        .map(|mutation| {
            Ok(match mutation {
                Mutation::Put { id, revision, body } => Change::Put(Arc::new(
                    Document::decode_body(id, Revision::new(revision), &body)?,
                )),
                Mutation::Delete { id } => Change::Delete(id),
                Mutation::DefineIndex { path } => Change::DefineIndex(parse_logged_path(&path)?),
                Mutation::DropIndex { path } => Change::DropIndex(parse_logged_path(&path)?),
            })
        })
        .collect()
}

fn parse_logged_path(path: &str) -> Result<FieldPath> {
    FieldPath::parse(path)
        .map_err(|e| Error::corruption(format!("logged index path '{}': {}", path, e)))
}
