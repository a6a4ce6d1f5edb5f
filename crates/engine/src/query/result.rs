//! Query results
//!
//! Matching is decided when the query runs; a [`ResultSet`] holds the
//! matched documents and projects each one into a [`Row`] as it is
//! iterated. Rows own their values and stay valid after the result set is
//! gone, but the result set itself refuses to produce rows once its
//! database is closed.

use std::sync::Arc;

use vellum_core::{Document, Error, FieldPath, Result, Value};

use super::plan::Plan;
use crate::database::Database;

/// Column of a row-producing query
#[derive(Debug, Clone)]
pub(crate) enum Projection {
    Id,
    All,
    Field(FieldPath),
}

impl Projection {
    fn project(&self, doc: &Document) -> Value {
        match self {
            Projection::Id => Value::from(doc.id()),
            Projection::All => Value::Object(doc.fields().clone()),
            Projection::Field(path) => doc.get_path(path).cloned().unwrap_or(Value::Null),
        }
    }
}

/// One result row: values in select-list order
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Value at position `index`
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value of the first column named `name`
    pub fn get_named(&self, name: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|c| c == name)?;
        self.values.get(index)
    }

    /// Column names
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in column order
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Take the values
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

enum Source {
    Documents {
        docs: Vec<Arc<Document>>,
        projection: Vec<Projection>,
        next: usize,
    },
    Aggregate(Option<Vec<Value>>),
}

/// Rows of an executed query
///
/// Iterating yields `Result<Row>`: after the database is closed the next
/// call yields `Error::Closed` and iteration ends.
pub struct ResultSet<'db> {
    db: &'db Database,
    plan: Plan,
    columns: Arc<[String]>,
    source: Source,
    failed: bool,
}

impl<'db> ResultSet<'db> {
    pub(crate) fn documents(
        db: &'db Database,
        plan: Plan,
        columns: Vec<String>,
        projection: Vec<Projection>,
        docs: Vec<Arc<Document>>,
    ) -> Self {
        ResultSet {
            db,
            plan,
            columns: columns.into(),
            source: Source::Documents {
                docs,
                projection,
                next: 0,
            },
            failed: false,
        }
    }

    pub(crate) fn aggregate(
        db: &'db Database,
        plan: Plan,
        columns: Vec<String>,
        values: Vec<Value>,
    ) -> Self {
        ResultSet {
            db,
            plan,
            columns: columns.into(),
            source: Source::Aggregate(Some(values)),
            failed: false,
        }
    }

    /// Access path the query used
    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// Column names, in select-list order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows not yet returned
    pub fn remaining(&self) -> usize {
        match &self.source {
            _ if self.failed => 0,
            Source::Documents { docs, next, .. } => docs.len() - next,
            Source::Aggregate(row) => usize::from(row.is_some()),
        }
    }

    /// Collect every remaining row
    pub fn all(self) -> Result<Vec<Row>> {
        self.collect()
    }
}

impl Iterator for ResultSet<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining() == 0 {
            return None;
        }
        if self.db.is_closed() {
            self.failed = true;
            return Some(Err(Error::Closed {
                name: self.db.name().to_string(),
            }));
        }
        let values = match &mut self.source {
            Source::Documents {
                docs,
                projection,
                next,
            } => {
                let doc = &docs[*next];
                *next += 1;
                projection.iter().map(|p| p.project(doc)).collect()
            }
            Source::Aggregate(row) => row.take()?,
        };
        Some(Ok(Row {
            columns: Arc::clone(&self.columns),
            values,
        }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining()))
    }
}

impl std::fmt::Debug for ResultSet<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSet")
            .field("plan", &self.plan)
            .field("columns", &self.columns)
            .field("remaining", &self.remaining())
            .finish()
    }
}
