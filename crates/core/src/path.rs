//! Field paths
//!
//! A `FieldPath` names a (possibly nested) field of a document using dot
//! notation: `"age"`, `"address.city"`. Each segment descends into an
//! `Object` value. Field names containing a literal `.` cannot be addressed
//! through a path; use [`crate::Document::get`] for those.

use crate::error::{Error, Result};
use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Maximum number of segments in a field path
pub const MAX_PATH_DEPTH: usize = 32;

/// Parsed dot-separated path into a document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parse a dotted path.
    ///
    /// Fails with [`Error::InvalidQuery`] on empty input, empty segments
    /// (`"a..b"`, `".a"`) or more than [`MAX_PATH_DEPTH`] segments.
    pub fn parse(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Err(Error::invalid_query("field path is empty"));
        }
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(Error::invalid_query(format!(
                "field path '{}' has an empty segment",
                path
            )));
        }
        if segments.len() > MAX_PATH_DEPTH {
            return Err(Error::invalid_query(format!(
                "field path '{}' exceeds {} segments",
                path, MAX_PATH_DEPTH
            )));
        }
        Ok(FieldPath { segments })
    }

    /// Single-segment path naming a top-level field verbatim.
    pub fn field(name: impl Into<String>) -> Self {
        FieldPath {
            segments: vec![name.into()],
        }
    }

    /// Path segments, outermost first
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment; used as the column name of a projected field
    pub fn leaf(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Whether this path names a top-level field
    pub fn is_top_level(&self) -> bool {
        self.segments.len() == 1
    }

    /// Resolve the path against a field map.
    ///
    /// Returns `None` when any segment is missing or descends into a
    /// non-object value.
    pub fn resolve<'a>(&self, fields: &'a BTreeMap<String, Value>) -> Option<&'a Value> {
        let (first, rest) = self.segments.split_first()?;
        let mut current = fields.get(first)?;
        for segment in rest {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl FromStr for FieldPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        FieldPath::parse(s)
    }
}
