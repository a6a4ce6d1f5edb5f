//! Declarative queries
//!
//! A [`Query`] is a select list plus an optional [`Predicate`]. Running it:
//! 1. Compile: parse field paths, check literals and the select list
//!    (`InvalidQuery` on any problem; nothing has been read yet)
//! 2. Plan: full scan, or an index probe on the leading conjunct
//! 3. Filter: evaluate the predicate over the candidates in id order; a
//!    `TypeMismatch` aborts here, before any row exists
//! 4. Produce: project rows lazily, or reduce to one aggregate row
//!
//! ```ignore
//! let query = Query::select([SelectItem::id(), SelectItem::all()]).filter(
//!     Predicate::equals("hired", false)
//!         .and(Predicate::between("age", 20, 50))
//!         .and(Predicate::equals("name", "Foo1")),
//! );
//! for row in db.query(&query)? {
//!     let row = row?;
//! }
//! ```

pub mod aggregate;
pub mod plan;
pub mod predicate;
pub mod result;

pub use aggregate::Aggregate;
pub use plan::Plan;
pub use predicate::Predicate;
pub use result::{ResultSet, Row};

use std::sync::Arc;

use tracing::debug;
use vellum_core::{Error, FieldPath, Result};

use crate::database::Database;
use aggregate::CompiledAggregate;
use predicate::CompiledPredicate;
use result::Projection;

/// Column name of [`SelectItem::Id`]
pub const ID_COLUMN: &str = "id";

/// One entry of a select list
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// The document id, column `id`
    Id,
    /// All fields as an object, column named after the database
    All,
    /// One field by dotted path, column named after the last segment;
    /// `Null` when missing
    Field(String),
    /// An aggregate; a query selecting aggregates selects only aggregates
    Aggregate(Aggregate),
}

impl SelectItem {
    /// Document id
    pub fn id() -> Self {
        SelectItem::Id
    }

    /// All fields
    pub fn all() -> Self {
        SelectItem::All
    }

    /// One field
    pub fn field(path: impl Into<String>) -> Self {
        SelectItem::Field(path.into())
    }

    /// An aggregate
    pub fn aggregate(aggregate: Aggregate) -> Self {
        SelectItem::Aggregate(aggregate)
    }
}

impl From<Aggregate> for SelectItem {
    fn from(aggregate: Aggregate) -> Self {
        SelectItem::Aggregate(aggregate)
    }
}

/// Select list plus optional filter
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    select: Vec<SelectItem>,
    filter: Option<Predicate>,
}

enum Output {
    Rows {
        columns: Vec<String>,
        projection: Vec<Projection>,
    },
    Aggregates(Vec<CompiledAggregate>),
}

struct CompiledQuery {
    predicate: Option<CompiledPredicate>,
    output: Output,
}

impl Query {
    /// Query producing the given columns
    pub fn select<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<SelectItem>,
    {
        Query {
            select: items.into_iter().map(Into::into).collect(),
            filter: None,
        }
    }

    /// Restrict to documents matching `predicate`.
    ///
    /// Calling this again combines the predicates with `And`.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    /// Select list
    pub fn items(&self) -> &[SelectItem] {
        &self.select
    }

    /// Filter, if any
    pub fn predicate(&self) -> Option<&Predicate> {
        self.filter.as_ref()
    }

    /// Plan the query would use against `db`, without running it
    pub fn explain(&self, db: &Database) -> Result<Plan> {
        let compiled = self.compile(db)?;
        db.ensure_open()?;
        Ok(plan::plan(compiled.predicate.as_ref(), db.store()).0)
    }

    /// Run the query against `db`
    pub fn execute<'db>(&self, db: &'db Database) -> Result<ResultSet<'db>> {
        let compiled = self.compile(db)?;
        db.ensure_open()?;

        let (plan, candidates) = plan::plan(compiled.predicate.as_ref(), db.store());
        let mut matched = Vec::new();
        for doc in candidates.iter() {
            if let Some(predicate) = &compiled.predicate {
                if !predicate.matches(doc)? {
                    continue;
                }
            }
            matched.push(Arc::clone(doc));
        }

        debug!(
            target: "vellum::query",
            plan = %plan,
            candidates = candidates.len(),
            matched = matched.len(),
            revision = %candidates.revision(),
            "Query executed"
        );

        Ok(match compiled.output {
            Output::Rows {
                columns,
                projection,
            } => ResultSet::documents(db, plan, columns, projection, matched),
            Output::Aggregates(aggregates) => {
                let columns = aggregates.iter().map(CompiledAggregate::column).collect();
                let values = aggregates
                    .iter()
                    .map(|a| a.evaluate(matched.iter().map(|d| &**d)))
                    .collect();
                ResultSet::aggregate(db, plan, columns, values)
            }
        })
    }

    fn compile(&self, db: &Database) -> Result<CompiledQuery> {
        if self.select.is_empty() {
            return Err(Error::invalid_query("select list is empty"));
        }
        let aggregates = self
            .select
            .iter()
            .filter(|item| matches!(item, SelectItem::Aggregate(_)))
            .count();
        if aggregates > 0 && aggregates < self.select.len() {
            return Err(Error::invalid_query(
                "aggregates cannot be selected together with document columns",
            ));
        }

        let output = if aggregates > 0 {
            let compiled = self
                .select
                .iter()
                .filter_map(|item| match item {
                    SelectItem::Aggregate(a) => Some(a.compile()),
                    _ => None,
                })
                .collect::<Result<Vec<_>>>()?;
            Output::Aggregates(compiled)
        } else {
            let mut columns = Vec::with_capacity(self.select.len());
            let mut projection = Vec::with_capacity(self.select.len());
            for item in &self.select {
                let (column, p) = match item {
                    SelectItem::Id => (ID_COLUMN.to_string(), Projection::Id),
                    SelectItem::All => (db.name().to_string(), Projection::All),
                    SelectItem::Field(field) => {
                        let path = FieldPath::parse(field)?;
                        (path.leaf().to_string(), Projection::Field(path))
                    }
                    SelectItem::Aggregate(_) => continue,
                };
                columns.push(column);
                projection.push(p);
            }
            Output::Rows {
                columns,
                projection,
            }
        };

        let predicate = self.filter.as_ref().map(Predicate::compile).transpose()?;
        Ok(CompiledQuery { predicate, output })
    }
}

impl Database {
    /// Run `query`; see [`Query::execute`]
    pub fn query(&self, query: &Query) -> Result<ResultSet<'_>> {
        query.execute(self)
    }
}
