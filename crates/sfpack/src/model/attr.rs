//! Attribute values.
//!
//! A JSON-like value tree carried on features as properties and extension
//! members. Integers keep their signedness so they never decode as floats.

use std::collections::BTreeMap;

/// Ordered map of attribute names to values.
pub type AttrMap = BTreeMap<String, AttrValue>;

/// A dynamically typed attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Null,
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer that does not fit in `i64`.
    UInt(u64),
    Float(f64),
    String(String),
    Array(Vec<AttrValue>),
    Object(AttrMap),
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Int(v as i64)
    }
}

impl From<u64> for AttrValue {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(i) => AttrValue::Int(i),
            Err(_) => AttrValue::UInt(v),
        }
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::String(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::String(v)
    }
}

impl From<Vec<AttrValue>> for AttrValue {
    fn from(v: Vec<AttrValue>) -> Self {
        AttrValue::Array(v)
    }
}

impl From<AttrMap> for AttrValue {
    fn from(v: AttrMap) -> Self {
        AttrValue::Object(v)
    }
}
