//! Value types for Vellum
//!
//! This module defines:
//! - Value: tagged variant for every field a document can hold
//! - ValueKind: the comparison class of a value
//!
//! ## Value Model
//!
//! The Value enum has exactly 7 variants:
//! - Null, Bool, Int, Float, String, Array, Object
//!
//! ### Comparison Rules
//!
//! - `Int` and `Float` compare numerically with each other (exactly, no
//!   rounding through `f64`)
//! - Strings compare lexicographically by bytes
//! - Booleans support equality only
//! - `Null` equals only `Null` and has no ordering
//! - Arrays and objects support structural equality only
//! - Every other pairing is [`Error::TypeMismatch`]
//!
//! Structural `PartialEq` (used by tests and document equality) is stricter:
//! `Int(1) != Float(1.0)` there. Query evaluation goes through
//! [`Value::equals`] and [`Value::compare`] instead.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A dynamically typed field value
///
/// Float equality follows IEEE-754 semantics:
/// - `NaN != NaN`
/// - `-0.0 == 0.0`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit floating point (IEEE-754)
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Nested list
    Array(Vec<Value>),
    /// Nested document, ordered by field name
    Object(BTreeMap<String, Value>),
}

/// Comparison class of a [`Value`]
///
/// `Int` and `Float` share the `Number` class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKind {
    /// Null
    Null,
    /// Bool
    Bool,
    /// Int or Float
    Number,
    /// String
    String,
    /// Array
    Array,
    /// Object
    Object,
}

impl ValueKind {
    /// Whether values of this kind have an ordering
    pub fn is_orderable(self) -> bool {
        matches!(self, ValueKind::Number | ValueKind::String)
    }

    /// Whether values of this kind can be compared with values of `other`.
    ///
    /// `Null` is comparable with everything for equality; a null never
    /// matches a non-null literal but it is not a type error.
    pub fn is_comparable_with(self, other: ValueKind) -> bool {
        self == other || self == ValueKind::Null || other == ValueKind::Null
    }
}

// Custom PartialEq implementation for IEEE-754 float semantics
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Array(_) => "Array",
            Value::Object(_) => "Object",
        }
    }

    /// Comparison class of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) | Value::Float(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }

    /// Check if this is a null value
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this is an Int or Float value
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Get as bool if this is a Bool value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i64 if this is an Int value
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64 if this is a Float value
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Numeric value widened to f64 (Int or Float)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as &str if this is a String value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as &[Value] if this is an Array value
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get as &BTreeMap if this is an Object value
    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Equality with query semantics.
    ///
    /// Numbers compare across `Int`/`Float`; `Null` equals only `Null`;
    /// arrays and objects compare element-wise with the same rules.
    pub fn equals(&self, other: &Value) -> Result<bool> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => Ok(self.is_null() && other.is_null()),
            (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
            (Value::String(a), Value::String(b)) => Ok(a == b),
            (a, b) if a.is_number() && b.is_number() => {
                Ok(compare_numbers(a, b) == Some(Ordering::Equal))
            }
            (Value::Array(a), Value::Array(b)) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (x, y) in a.iter().zip(b) {
                    if !x.equals(y)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (Value::Object(a), Value::Object(b)) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                for ((ka, va), (kb, vb)) in a.iter().zip(b) {
                    if ka != kb || !va.equals(vb)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Err(self.mismatch(other)),
        }
    }

    /// Ordering with query semantics.
    ///
    /// Only numbers and strings are ordered. Returns `Ok(None)` when a
    /// float operand is NaN.
    pub fn compare(&self, other: &Value) -> Result<Option<Ordering>> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Ok(Some(a.cmp(b))),
            (a, b) if a.is_number() && b.is_number() => Ok(compare_numbers(a, b)),
            _ => Err(self.mismatch(other)),
        }
    }

    fn mismatch(&self, other: &Value) -> Error {
        Error::TypeMismatch {
            left: self.type_name(),
            right: other.type_name(),
        }
    }
}

/// Compare two numeric values without losing integer precision.
fn compare_numbers(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::Int(x), Value::Float(y)) => cmp_int_float(*x, *y),
        (Value::Float(x), Value::Int(y)) => cmp_int_float(*y, *x).map(Ordering::reverse),
        _ => None,
    }
}

/// Exact comparison of an i64 against an f64.
fn cmp_int_float(i: i64, f: f64) -> Option<Ordering> {
    if f.is_nan() {
        return None;
    }
    // 2^63 is exactly representable; anything at or beyond it is out of range.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f >= LIMIT {
        return Some(Ordering::Less);
    }
    if f < -LIMIT {
        return Some(Ordering::Greater);
    }
    let whole = f.trunc();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0f64.partial_cmp(&(f - whole)),
        ord => Some(ord),
    }
}

// ============================================================================
// From implementations for ergonomic API usage
// ============================================================================

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f as f64)
    }
}

impl From<Vec<Value>> for Value {
    fn from(a: Vec<Value>) -> Self {
        Value::Array(a)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(o: BTreeMap<String, Value>) -> Self {
        Value::Object(o)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// ============================================================================
// serde_json interop
// ============================================================================

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    // u64 beyond i64::MAX, or a real float
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(arr) => {
                Value::Array(arr.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(obj) => {
                Value::Object(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::Number(i.into()),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::Array(arr) => {
                serde_json::Value::Array(arr.into_iter().map(serde_json::Value::from).collect())
            }
            Value::Object(obj) => serde_json::Value::Object(
                obj.into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_name_and_kind() {
        assert_eq!(Value::Null.type_name(), "Null");
        assert_eq!(Value::Int(1).type_name(), "Int");
        assert_eq!(Value::Float(1.0).type_name(), "Float");
        assert_eq!(Value::Int(1).kind(), ValueKind::Number);
        assert_eq!(Value::Float(1.0).kind(), ValueKind::Number);
        assert_eq!(Value::Array(vec![]).kind(), ValueKind::Array);
        assert_eq!(Value::Object(BTreeMap::new()).kind(), ValueKind::Object);
    }

    #[test]
    fn test_structural_eq_keeps_types_apart() {
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_eq!(Value::Float(-0.0), Value::Float(0.0));
    }

    #[test]
    fn test_equals_numeric_across_kinds() {
        assert!(Value::Int(1).equals(&Value::Float(1.0)).unwrap());
        assert!(!Value::Int(1).equals(&Value::Float(1.5)).unwrap());
        assert!(Value::Float(20.0).equals(&Value::Int(20)).unwrap());
    }

    #[test]
    fn test_equals_rejects_incompatible_kinds() {
        let err = Value::String("1".into()).equals(&Value::Int(1)).unwrap_err();
        assert!(matches!(
            err,
            Error::TypeMismatch {
                left: "String",
                right: "Int"
            }
        ));
        assert!(Value::Bool(true).equals(&Value::Int(1)).is_err());
    }

    #[test]
    fn test_equals_null_is_not_an_error() {
        assert!(Value::Null.equals(&Value::Null).unwrap());
        assert!(!Value::Null.equals(&Value::Int(0)).unwrap());
        assert!(!Value::Bool(false).equals(&Value::Null).unwrap());
    }

    #[test]
    fn test_equals_nested() {
        let a = Value::Array(vec![Value::Int(1), Value::String("x".into())]);
        let b = Value::Array(vec![Value::Float(1.0), Value::String("x".into())]);
        assert!(a.equals(&b).unwrap());

        let mismatched = Value::Array(vec![Value::Bool(true), Value::String("x".into())]);
        assert!(a.equals(&mismatched).is_err());
    }

    #[test]
    fn test_compare_strings_lexicographic() {
        let a = Value::from("Foo1");
        let b = Value::from("Foo10");
        assert_eq!(a.compare(&b).unwrap(), Some(Ordering::Less));
        assert_eq!(b.compare(&a).unwrap(), Some(Ordering::Greater));
    }

    #[test]
    fn test_compare_bool_is_mismatch() {
        assert!(Value::Bool(true).compare(&Value::Bool(false)).is_err());
        assert!(Value::Null.compare(&Value::Int(1)).is_err());
    }

    #[test]
    fn test_compare_nan_is_unordered() {
        assert_eq!(Value::Float(f64::NAN).compare(&Value::Int(1)).unwrap(), None);
    }

    #[test]
    fn test_int_float_compare_is_exact() {
        // 2^53 + 1 is not representable as f64
        let big = (1i64 << 53) + 1;
        let f = (1i64 << 53) as f64;
        assert_eq!(
            Value::Int(big).compare(&Value::Float(f)).unwrap(),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Value::Int(i64::MAX).compare(&Value::Float(9.3e18)).unwrap(),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Int(i64::MIN).compare(&Value::Float(-9.3e18)).unwrap(),
            Some(Ordering::Greater)
        );
        assert_eq!(
            Value::Int(-3).compare(&Value::Float(-2.5)).unwrap(),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Float(2.5).compare(&Value::Int(2)).unwrap(),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn test_kind_compatibility() {
        assert!(ValueKind::Number.is_comparable_with(ValueKind::Number));
        assert!(ValueKind::Null.is_comparable_with(ValueKind::String));
        assert!(!ValueKind::Bool.is_comparable_with(ValueKind::Number));
        assert!(ValueKind::String.is_orderable());
        assert!(!ValueKind::Bool.is_orderable());
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(Value::from(42i32), Value::Int(42));
        assert_eq!(Value::from(7u32), Value::Int(7));
        assert_eq!(Value::from("hi"), Value::String("hi".into()));
        assert_eq!(Value::from(Some(true)), Value::Bool(true));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(()), Value::Null);
    }

    #[test]
    fn test_serde_json_nested_conversion() {
        let json = serde_json::json!({"a": [1, 2.5, "three"], "b": null});
        let v: Value = json.into();
        let obj = v.as_object().unwrap();
        assert_eq!(
            obj.get("a").unwrap().as_array().unwrap()[1],
            Value::Float(2.5)
        );
        assert!(obj.get("b").unwrap().is_null());
    }

    #[test]
    fn test_serde_json_nan_becomes_null() {
        let json: serde_json::Value = Value::Float(f64::NAN).into();
        assert!(json.is_null());
    }

    #[test]
    fn test_msgpack_preserves_number_kinds() {
        let original = Value::Array(vec![Value::Int(3), Value::Float(3.0)]);
        let bytes = rmp_serde::to_vec(&original).unwrap();
        let restored: Value = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(original, restored);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn number() -> impl Strategy<Value = Value> {
            prop_oneof![
                any::<i64>().prop_map(Value::Int),
                (-1i64 << 54..1i64 << 54).prop_map(Value::Int),
                prop::num::f64::NORMAL.prop_map(Value::Float),
                (-1000i64..1000).prop_map(|v| Value::Float(v as f64 / 4.0)),
            ]
        }

        proptest! {
            #[test]
            fn numeric_compare_is_antisymmetric(a in number(), b in number()) {
                let ab = a.compare(&b).unwrap();
                let ba = b.compare(&a).unwrap();
                prop_assert_eq!(ab, ba.map(Ordering::reverse));
            }

            #[test]
            fn numeric_equals_agrees_with_compare(a in number(), b in number()) {
                let equal = a.compare(&b).unwrap() == Some(Ordering::Equal);
                prop_assert_eq!(a.equals(&b).unwrap(), equal);
            }

            #[test]
            fn int_float_ordering_matches_wide_arithmetic(i in -1i64 << 40..1i64 << 40, f in -1e12f64..1e12) {
                let expected = (i as f64).partial_cmp(&f);
                prop_assert_eq!(Value::Int(i).compare(&Value::Float(f)).unwrap(), expected);
            }
        }
    }
}
