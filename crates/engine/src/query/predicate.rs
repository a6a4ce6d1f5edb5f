//! Predicate trees
//!
//! A [`Predicate`] is the user-facing filter. Compiling it parses every
//! field path and checks every literal once, so evaluation per document
//! only resolves paths and compares values.
//!
//! Evaluation uses two-valued logic: a leaf whose field is missing, or
//! holds `Null`, is false. `Not` of such a leaf is therefore true.
//! Comparing a present value against a literal of an incompatible kind is
//! a `TypeMismatch` and aborts the query.

use std::cmp::Ordering;
use std::fmt;

use vellum_core::{Document, Error, FieldPath, Result, Value, ValueKind};

/// Filter over document fields
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `field == value`
    Equals {
        /// Dotted field path
        field: String,
        /// Literal
        value: Value,
    },
    /// `low <= field <= high`
    Between {
        /// Dotted field path
        field: String,
        /// Inclusive lower bound
        low: Value,
        /// Inclusive upper bound
        high: Value,
    },
    /// `field < value`
    LessThan {
        /// Dotted field path
        field: String,
        /// Literal
        value: Value,
    },
    /// `field > value`
    GreaterThan {
        /// Dotted field path
        field: String,
        /// Literal
        value: Value,
    },
    /// Both sides match; the right side is skipped when the left is false
    And(Box<Predicate>, Box<Predicate>),
    /// Either side matches; the right side is skipped when the left is true
    Or(Box<Predicate>, Box<Predicate>),
    /// The inner predicate does not match
    Not(Box<Predicate>),
}

impl Predicate {
    /// `field == value`
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    /// `low <= field <= high`
    pub fn between(field: impl Into<String>, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Predicate::Between {
            field: field.into(),
            low: low.into(),
            high: high.into(),
        }
    }

    /// `field < value`
    pub fn less_than(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::LessThan {
            field: field.into(),
            value: value.into(),
        }
    }

    /// `field > value`
    pub fn greater_than(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::GreaterThan {
            field: field.into(),
            value: value.into(),
        }
    }

    /// `self AND other`
    pub fn and(self, other: Predicate) -> Self {
        Predicate::And(Box::new(self), Box::new(other))
    }

    /// `self OR other`
    pub fn or(self, other: Predicate) -> Self {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    /// `NOT self`
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    pub(crate) fn compile(&self) -> Result<CompiledPredicate> {
        Ok(match self {
            Predicate::Equals { field, value } => CompiledPredicate::Equals {
                path: FieldPath::parse(field)?,
                value: value.clone(),
            },
            Predicate::Between { field, low, high } => {
                let path = FieldPath::parse(field)?;
                check_orderable(&path, low)?;
                check_orderable(&path, high)?;
                if low.kind() != high.kind() {
                    return Err(Error::invalid_query(format!(
                        "BETWEEN bounds on '{}' have different kinds: {} and {}",
                        path,
                        low.type_name(),
                        high.type_name()
                    )));
                }
                CompiledPredicate::Range {
                    path,
                    low: Some((low.clone(), true)),
                    high: Some((high.clone(), true)),
                }
            }
            Predicate::LessThan { field, value } => {
                let path = FieldPath::parse(field)?;
                check_orderable(&path, value)?;
                CompiledPredicate::Range {
                    path,
                    low: None,
                    high: Some((value.clone(), false)),
                }
            }
            Predicate::GreaterThan { field, value } => {
                let path = FieldPath::parse(field)?;
                check_orderable(&path, value)?;
                CompiledPredicate::Range {
                    path,
                    low: Some((value.clone(), false)),
                    high: None,
                }
            }
            Predicate::And(l, r) => {
                CompiledPredicate::And(Box::new(l.compile()?), Box::new(r.compile()?))
            }
            Predicate::Or(l, r) => {
                CompiledPredicate::Or(Box::new(l.compile()?), Box::new(r.compile()?))
            }
            Predicate::Not(inner) => CompiledPredicate::Not(Box::new(inner.compile()?)),
        })
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Equals { field, value } => write!(f, "{} = {:?}", field, value),
            Predicate::Between { field, low, high } => {
                write!(f, "{} BETWEEN {:?} AND {:?}", field, low, high)
            }
            Predicate::LessThan { field, value } => write!(f, "{} < {:?}", field, value),
            Predicate::GreaterThan { field, value } => write!(f, "{} > {:?}", field, value),
            Predicate::And(l, r) => write!(f, "({} AND {})", l, r),
            Predicate::Or(l, r) => write!(f, "({} OR {})", l, r),
            Predicate::Not(inner) => write!(f, "NOT {}", inner),
        }
    }
}

fn check_orderable(path: &FieldPath, literal: &Value) -> Result<()> {
    if literal.kind().is_orderable() {
        Ok(())
    } else {
        Err(Error::invalid_query(format!(
            "cannot order '{}' against a {} literal",
            path,
            literal.type_name()
        )))
    }
}

/// Predicate with parsed paths, ready to evaluate
///
/// `Between`, `LessThan` and `GreaterThan` all compile to `Range`; each
/// bound carries whether it is inclusive.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CompiledPredicate {
    Equals {
        path: FieldPath,
        value: Value,
    },
    Range {
        path: FieldPath,
        low: Option<(Value, bool)>,
        high: Option<(Value, bool)>,
    },
    And(Box<CompiledPredicate>, Box<CompiledPredicate>),
    Or(Box<CompiledPredicate>, Box<CompiledPredicate>),
    Not(Box<CompiledPredicate>),
}

impl CompiledPredicate {
    /// Evaluate against one document
    pub(crate) fn matches(&self, doc: &Document) -> Result<bool> {
        match self {
            CompiledPredicate::Equals { path, value } => match present(doc, path) {
                Some(actual) => actual.equals(value),
                None => Ok(false),
            },
            CompiledPredicate::Range { path, low, high } => {
                let actual = match present(doc, path) {
                    Some(actual) => actual,
                    None => return Ok(false),
                };
                if let Some((bound, inclusive)) = low {
                    if !satisfies(actual.compare(bound)?, Ordering::Greater, *inclusive) {
                        return Ok(false);
                    }
                }
                if let Some((bound, inclusive)) = high {
                    if !satisfies(actual.compare(bound)?, Ordering::Less, *inclusive) {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            CompiledPredicate::And(l, r) => Ok(l.matches(doc)? && r.matches(doc)?),
            CompiledPredicate::Or(l, r) => Ok(l.matches(doc)? || r.matches(doc)?),
            CompiledPredicate::Not(inner) => Ok(!inner.matches(doc)?),
        }
    }

    /// Leftmost leaf of the top-level `And` chain.
    ///
    /// A document rejected by this leaf is rejected by the whole predicate
    /// before any other leaf is evaluated.
    pub(crate) fn leading_conjunct(&self) -> &CompiledPredicate {
        match self {
            CompiledPredicate::And(l, _) => l.leading_conjunct(),
            other => other,
        }
    }

    /// Field path and literal kind of a leaf, `None` for connectives
    pub(crate) fn leaf_target(&self) -> Option<(&FieldPath, ValueKind)> {
        match self {
            CompiledPredicate::Equals { path, value } => Some((path, value.kind())),
            CompiledPredicate::Range { path, low, high } => {
                let kind = low.as_ref().or(high.as_ref()).map(|(v, _)| v.kind())?;
                Some((path, kind))
            }
            _ => None,
        }
    }
}

/// Field value, treating `Null` as absent
fn present<'a>(doc: &'a Document, path: &FieldPath) -> Option<&'a Value> {
    doc.get_path(path).filter(|v| !v.is_null())
}

/// Whether `ordering` (actual vs bound) is on the `wanted` side of the
/// bound, or equal when `inclusive`. NaN (`None`) never satisfies.
fn satisfies(ordering: Option<Ordering>, wanted: Ordering, inclusive: bool) -> bool {
    match ordering {
        Some(Ordering::Equal) => inclusive,
        Some(ord) => ord == wanted,
        None => false,
    }
}
