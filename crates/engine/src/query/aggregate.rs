//! Aggregates over the matched documents
//!
//! Numeric aggregates skip documents where the field is missing, null or
//! not a number; they never fail the query. `Sum` stays an integer until a
//! float operand appears or the integer sum overflows.

use std::cmp::Ordering;
use std::fmt;

use vellum_core::{Document, FieldPath, Result, Value};

/// Reduction of the matched documents to one value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aggregate {
    /// Sum of a numeric field; `0` over no values
    Sum(String),
    /// Number of matched documents
    Count,
    /// Number of matched documents where the field is present and not null
    CountField(String),
    /// Mean of a numeric field as a float; `Null` over no values
    Avg(String),
    /// Smallest numeric value; `Null` over no values
    Min(String),
    /// Largest numeric value; `Null` over no values
    Max(String),
}

impl Aggregate {
    /// `sum(field)`
    pub fn sum(field: impl Into<String>) -> Self {
        Aggregate::Sum(field.into())
    }

    /// `count(*)`
    pub fn count() -> Self {
        Aggregate::Count
    }

    /// `count(field)`
    pub fn count_field(field: impl Into<String>) -> Self {
        Aggregate::CountField(field.into())
    }

    /// `avg(field)`
    pub fn avg(field: impl Into<String>) -> Self {
        Aggregate::Avg(field.into())
    }

    /// `min(field)`
    pub fn min(field: impl Into<String>) -> Self {
        Aggregate::Min(field.into())
    }

    /// `max(field)`
    pub fn max(field: impl Into<String>) -> Self {
        Aggregate::Max(field.into())
    }

    pub(crate) fn compile(&self) -> Result<CompiledAggregate> {
        let path = match self {
            Aggregate::Count => None,
            Aggregate::Sum(f)
            | Aggregate::CountField(f)
            | Aggregate::Avg(f)
            | Aggregate::Min(f)
            | Aggregate::Max(f) => Some(FieldPath::parse(f)?),
        };
        Ok(CompiledAggregate {
            aggregate: self.clone(),
            path,
        })
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregate::Sum(field) => write!(f, "sum({})", field),
            Aggregate::Count => write!(f, "count(*)"),
            Aggregate::CountField(field) => write!(f, "count({})", field),
            Aggregate::Avg(field) => write!(f, "avg({})", field),
            Aggregate::Min(field) => write!(f, "min({})", field),
            Aggregate::Max(field) => write!(f, "max({})", field),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CompiledAggregate {
    aggregate: Aggregate,
    path: Option<FieldPath>,
}

impl CompiledAggregate {
    /// Column name of the aggregate in the result row
    pub(crate) fn column(&self) -> String {
        self.aggregate.to_string()
    }

    /// Reduce `docs` to one value
    pub(crate) fn evaluate<'a, I>(&self, docs: I) -> Value
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let values = |docs: I| {
            let path = self.path.as_ref();
            docs.into_iter()
                .filter_map(move |doc| path.and_then(|p| doc.get_path(p)))
        };
        match &self.aggregate {
            Aggregate::Count => Value::Int(docs.into_iter().count() as i64),
            Aggregate::CountField(_) => {
                Value::Int(values(docs).filter(|v| !v.is_null()).count() as i64)
            }
            Aggregate::Sum(_) => values(docs)
                .filter(|v| v.is_number())
                .fold(Sum::Int(0), Sum::add)
                .into_value(),
            Aggregate::Avg(_) => {
                let (total, n) = values(docs)
                    .filter_map(Value::as_f64)
                    .fold((0.0, 0u64), |(total, n), x| (total + x, n + 1));
                if n == 0 {
                    Value::Null
                } else {
                    Value::Float(total / n as f64)
                }
            }
            Aggregate::Min(_) => extreme(values(docs), Ordering::Less),
            Aggregate::Max(_) => extreme(values(docs), Ordering::Greater),
        }
    }
}

/// Running sum
#[derive(Debug, Clone, Copy)]
enum Sum {
    Int(i64),
    Float(f64),
}

impl Sum {
    fn add(self, value: &Value) -> Sum {
        match (self, value) {
            (Sum::Int(acc), Value::Int(x)) => match acc.checked_add(*x) {
                Some(total) => Sum::Int(total),
                None => Sum::Float(acc as f64 + *x as f64),
            },
            (Sum::Int(acc), Value::Float(x)) => Sum::Float(acc as f64 + x),
            (Sum::Float(acc), Value::Int(x)) => Sum::Float(acc + *x as f64),
            (Sum::Float(acc), Value::Float(x)) => Sum::Float(acc + x),
            (acc, _) => acc,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Sum::Int(total) => Value::Int(total),
            Sum::Float(total) => Value::Float(total),
        }
    }
}

/// Numeric value furthest in direction `keep`, skipping NaN
fn extreme<'a>(values: impl Iterator<Item = &'a Value>, keep: Ordering) -> Value {
    let mut best: Option<&Value> = None;
    for value in values.filter(|v| v.is_number()) {
        best = match best {
            None if value.as_f64().map_or(false, |f| !f.is_nan()) => Some(value),
            None => None,
            Some(current) => match value.compare(current) {
                Ok(Some(ord)) if ord == keep => Some(value),
                _ => Some(current),
            },
        };
    }
    best.cloned().unwrap_or(Value::Null)
}
