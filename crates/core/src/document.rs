//! Documents
//!
//! A `Document` is a uniquely identified, schema-less record: a string id
//! plus a map from field name to [`Value`], ordered by field name.
//!
//! A document starts life as an in-memory builder. Saving it persists a
//! complete revision; re-saving the same id replaces the stored revision
//! entirely (there is no partial merge). Documents handed out by the
//! database carry the [`Revision`] they were written at.

use crate::error::{Error, Result};
use crate::path::FieldPath;
use crate::revision::Revision;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum document id length in bytes
pub const MAX_ID_LENGTH: usize = 1024;

/// Validate a document id.
///
/// Ids must be non-empty, at most [`MAX_ID_LENGTH`] bytes and free of NUL
/// characters.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::invalid_input("document id must not be empty"));
    }
    if id.len() > MAX_ID_LENGTH {
        return Err(Error::invalid_input(format!(
            "document id is {} bytes, maximum is {}",
            id.len(),
            MAX_ID_LENGTH
        )));
    }
    if id.contains('\0') {
        return Err(Error::invalid_input("document id must not contain NUL"));
    }
    Ok(())
}

/// A schema-less record of typed fields
///
/// Equality compares id and fields; the revision is metadata and is
/// ignored, so a saved-then-loaded document equals the one that was saved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    id: String,
    fields: BTreeMap<String, Value>,
    #[serde(skip)]
    revision: Option<Revision>,
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.fields == other.fields
    }
}

impl Document {
    /// Create an empty document with the given id
    pub fn new(id: impl Into<String>) -> Self {
        Document {
            id: id.into(),
            fields: BTreeMap::new(),
            revision: None,
        }
    }

    /// Create a document from an existing field map
    pub fn with_fields(id: impl Into<String>, fields: BTreeMap<String, Value>) -> Self {
        Document {
            id: id.into(),
            fields,
            revision: None,
        }
    }

    /// Build a document from a JSON object.
    ///
    /// Fails with [`Error::InvalidInput`] if `json` is not an object.
    pub fn from_json(id: impl Into<String>, json: serde_json::Value) -> Result<Self> {
        match Value::from(json) {
            Value::Object(fields) => Ok(Document::with_fields(id, fields)),
            other => Err(Error::invalid_input(format!(
                "document body must be a JSON object, got {}",
                other.type_name()
            ))),
        }
    }

    /// Render the fields as a JSON object (the id is not included)
    pub fn to_json(&self) -> serde_json::Value {
        Value::Object(self.fields.clone()).into()
    }

    /// Document id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Revision this document was persisted at, `None` if never saved
    pub fn revision(&self) -> Option<Revision> {
        self.revision
    }

    /// Set a field, replacing any previous value
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Builder-style [`Document::set`]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Get a top-level field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Get a possibly nested field
    pub fn get_path(&self, path: &FieldPath) -> Option<&Value> {
        path.resolve(&self.fields)
    }

    /// Remove a field, returning its value
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Whether a top-level field is present
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// All fields, ordered by name
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Number of top-level fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the document has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Copy of this document stamped with a revision
    pub fn at_revision(mut self, revision: Revision) -> Self {
        self.revision = Some(revision);
        self
    }

    /// Encode the field map for storage
    pub fn encode_body(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec(&self.fields)?)
    }

    /// Decode a stored field map back into a document
    pub fn decode_body(id: impl Into<String>, revision: Revision, body: &[u8]) -> Result<Self> {
        let fields: BTreeMap<String, Value> = rmp_serde::from_slice(body)?;
        Ok(Document::with_fields(id, fields).at_revision(revision))
    }
}
