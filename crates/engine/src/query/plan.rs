//! Access path selection
//!
//! Two plans exist: scan every document, or probe a field index for the
//! leading conjunct of the predicate and evaluate the full predicate on
//! the candidates only. A probe is chosen only when it returns exactly the
//! documents the leading conjunct accepts, so both plans produce the same
//! rows and raise the same errors.

use std::fmt;
use std::ops::Bound;

use vellum_core::Value;
use vellum_storage::{DocumentSnapshot, DocumentStore};

use super::predicate::CompiledPredicate;

/// How a query reads documents
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// Every document, ascending id order
    FullScan,
    /// Documents an index reports within the bounds, ascending id order
    IndexProbe {
        /// Indexed field path
        field: String,
        /// Lower bound on the field value
        lower: Bound<Value>,
        /// Upper bound on the field value
        upper: Bound<Value>,
    },
}

impl Plan {
    /// Whether this plan uses an index
    pub fn uses_index(&self) -> bool {
        matches!(self, Plan::IndexProbe { .. })
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plan::FullScan => write!(f, "FULL SCAN"),
            Plan::IndexProbe {
                field,
                lower,
                upper,
            } => {
                write!(f, "INDEX PROBE {} ", field)?;
                match lower {
                    Bound::Included(v) => write!(f, "[{:?}", v)?,
                    Bound::Excluded(v) => write!(f, "({:?}", v)?,
                    Bound::Unbounded => write!(f, "(-inf")?,
                }
                write!(f, ", ")?;
                match upper {
                    Bound::Included(v) => write!(f, "{:?}]", v),
                    Bound::Excluded(v) => write!(f, "{:?})", v),
                    Bound::Unbounded => write!(f, "+inf)"),
                }
            }
        }
    }
}

/// Pick the access path and read the candidate documents.
pub(crate) fn plan(
    predicate: Option<&CompiledPredicate>,
    store: &DocumentStore,
) -> (Plan, DocumentSnapshot) {
    if let Some(probe) = predicate.and_then(|p| try_probe(p.leading_conjunct(), store)) {
        return probe;
    }
    (Plan::FullScan, store.snapshot())
}

fn try_probe(leaf: &CompiledPredicate, store: &DocumentStore) -> Option<(Plan, DocumentSnapshot)> {
    let (path, kind) = leaf.leaf_target()?;
    let (lower, upper) = match leaf {
        CompiledPredicate::Equals { value, .. } => {
            (Bound::Included(value.clone()), Bound::Included(value.clone()))
        }
        CompiledPredicate::Range { low, high, .. } => (to_bound(low), to_bound(high)),
        _ => return None,
    };
    let snapshot = store.probe(path, kind, lower.as_ref(), upper.as_ref())?;
    Some((
        Plan::IndexProbe {
            field: path.to_string(),
            lower,
            upper,
        },
        snapshot,
    ))
}

fn to_bound(bound: &Option<(Value, bool)>) -> Bound<Value> {
    match bound {
        Some((value, true)) => Bound::Included(value.clone()),
        Some((value, false)) => Bound::Excluded(value.clone()),
        None => Bound::Unbounded,
    }
}
