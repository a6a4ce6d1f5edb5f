//! Secondary field indexes
//!
//! A `FieldIndex` maps the value of one field path to the ids of the
//! documents holding that value, so equality and range predicates can be
//! answered without scanning every document.
//!
//! Only scalar values are keyed: bools, numbers and strings. Null, missing,
//! array, object and NaN values never satisfy an indexed predicate, so they
//! are left out of the map. Every non-null value is still counted by kind;
//! the query planner uses those counts to decide whether a probe would
//! return exactly what a full scan returns (a scan raises `TypeMismatch`
//! when it meets a value of an incompatible kind, a probe would not).

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use vellum_core::{Document, FieldPath, Value, ValueKind};

/// Ordered key of an index entry
///
/// Kinds order as `Bool < Number < String`; numbers order exactly across
/// `Int` and `Float`, so `Int(1)` and `Float(1.0)` are the same key.
#[derive(Debug, Clone)]
pub enum IndexKey {
    /// Boolean
    Bool(bool),
    /// Int or non-NaN Float
    Number(Value),
    /// String
    String(String),
}

impl IndexKey {
    /// Key for a value, `None` if the value is not indexable
    pub fn from_value(value: &Value) -> Option<IndexKey> {
        match value {
            Value::Bool(b) => Some(IndexKey::Bool(*b)),
            Value::Int(_) => Some(IndexKey::Number(value.clone())),
            Value::Float(f) if !f.is_nan() => Some(IndexKey::Number(value.clone())),
            Value::String(s) => Some(IndexKey::String(s.clone())),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            IndexKey::Bool(_) => 0,
            IndexKey::Number(_) => 1,
            IndexKey::String(_) => 2,
        }
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (IndexKey::Bool(a), IndexKey::Bool(b)) => a.cmp(b),
            (IndexKey::Number(a), IndexKey::Number(b)) => a
                .compare(b)
                .ok()
                .flatten()
                .unwrap_or(Ordering::Equal),
            (IndexKey::String(a), IndexKey::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexKey {}

/// Secondary index: field value → document ids
#[derive(Debug, Clone)]
pub struct FieldIndex {
    path: FieldPath,
    entries: BTreeMap<IndexKey, BTreeSet<String>>,
    /// Non-null values seen, by kind (including unkeyed arrays, objects, NaN)
    kinds: BTreeMap<ValueKind, usize>,
}

impl FieldIndex {
    /// Create an empty index on `path`
    pub fn new(path: FieldPath) -> Self {
        FieldIndex {
            path,
            entries: BTreeMap::new(),
            kinds: BTreeMap::new(),
        }
    }

    /// Indexed field path
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    /// Add a document's value
    pub fn insert(&mut self, doc: &Document) {
        let Some(value) = doc.get_path(&self.path) else {
            return;
        };
        if value.is_null() {
            return;
        }
        *self.kinds.entry(value.kind()).or_default() += 1;
        if let Some(key) = IndexKey::from_value(value) {
            self.entries
                .entry(key)
                .or_default()
                .insert(doc.id().to_string());
        }
    }

    /// Remove a document's value
    ///
    /// `doc` must be the exact revision that was inserted.
    pub fn remove(&mut self, doc: &Document) {
        let Some(value) = doc.get_path(&self.path) else {
            return;
        };
        if value.is_null() {
            return;
        }
        let kind = value.kind();
        if let Some(count) = self.kinds.get_mut(&kind) {
            *count -= 1;
            if *count == 0 {
                self.kinds.remove(&kind);
            }
        }
        if let Some(key) = IndexKey::from_value(value) {
            if let Some(ids) = self.entries.get_mut(&key) {
                ids.remove(doc.id());
                if ids.is_empty() {
                    self.entries.remove(&key);
                }
            }
        }
    }

    /// Whether a probe with a literal of `kind` returns exactly the
    /// documents a scan would match.
    ///
    /// True when every non-null value in the index has that same kind and
    /// the kind is keyed.
    pub fn can_serve(&self, kind: ValueKind) -> bool {
        matches!(kind, ValueKind::Bool | ValueKind::Number | ValueKind::String)
            && self.kinds.keys().all(|k| *k == kind)
    }

    /// Ids whose value lies within the bounds, ascending.
    ///
    /// Returns `None` when a bound is not indexable (null, NaN, array,
    /// object) or the bounds are of different kinds.
    pub fn range(&self, lower: Bound<&Value>, upper: Bound<&Value>) -> Option<BTreeSet<String>> {
        let lower = map_bound(lower)?;
        let upper = map_bound(upper)?;

        if let (Some(lo), Some(hi)) = (bound_key(&lower), bound_key(&upper)) {
            if lo.rank() != hi.rank() {
                return None;
            }
            match lo.cmp(hi) {
                Ordering::Greater => return Some(BTreeSet::new()),
                Ordering::Equal
                    if matches!(lower, Bound::Excluded(_))
                        || matches!(upper, Bound::Excluded(_)) =>
                {
                    return Some(BTreeSet::new())
                }
                _ => {}
            }
        }

        Some(
            self.entries
                .range((lower, upper))
                .flat_map(|(_, ids)| ids.iter().cloned())
                .collect(),
        )
    }

    /// Ids whose value equals `value`
    pub fn lookup(&self, value: &Value) -> Option<BTreeSet<String>> {
        self.range(Bound::Included(value), Bound::Included(value))
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is indexed
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn map_bound(bound: Bound<&Value>) -> Option<Bound<IndexKey>> {
    Some(match bound {
        Bound::Included(v) => Bound::Included(IndexKey::from_value(v)?),
        Bound::Excluded(v) => Bound::Excluded(IndexKey::from_value(v)?),
        Bound::Unbounded => Bound::Unbounded,
    })
}

fn bound_key(bound: &Bound<IndexKey>) -> Option<&IndexKey> {
    match bound {
        Bound::Included(k) | Bound::Excluded(k) => Some(k),
        Bound::Unbounded => None,
    }
}
