//! Dynamically typed property values
//!
//! Every mapped attribute is read and written as a [`Value`]. Audit snapshots
//! are flat [`Snapshot`] maps from attribute name to value; embedded
//! components travel as [`Record`]s and dynamic components as nested maps.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::identity::EntityKey;

/// Flat, insertion-ordered attribute map (one row of historical state)
pub type Snapshot = IndexMap<String, Value>;

/// A property value
///
/// Equality is value equality. `Null` equals `Null` and floats compare by
/// bit pattern, so `NaN == NaN` while `0.0 != -0.0`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Ordered collection of element values
    List(Vec<Value>),
    /// Dynamic component: attribute name to value
    Map(Snapshot),
    /// State of an embedded component instance
    Record(Record),
    /// To-one association, by key
    Reference(EntityKey),
}

/// State of a component instance, detached from its Rust type
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Record {
    /// Component class name
    pub class: String,
    /// Property values in declaration order
    pub fields: Snapshot,
}

impl Record {
    /// Create an empty record for a class
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            fields: Snapshot::new(),
        }
    }

    /// Builder-style field insertion
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Get a field value
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

impl Value {
    /// Check for `Null`
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null, or an empty string
    pub fn is_null_or_empty_text(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Check for a string value
    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self, Value::Text(_))
    }

    /// Borrow the text if this is a string
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer if this is an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Borrow the list elements
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow the nested map
    pub fn as_map(&self) -> Option<&Snapshot> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Borrow the component record
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Borrow the referenced key
    pub fn as_reference(&self) -> Option<&EntityKey> {
        match self {
            Value::Reference(key) => Some(key),
            _ => None,
        }
    }

    /// Short name of the variant, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Record(_) => "record",
            Value::Reference(_) => "reference",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            (Value::Reference(a), Value::Reference(b)) => a == b,
            _ => false,
        }
    }
}

// Bitwise float comparison keeps equality reflexive
impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => write!(f, "{:?}", v),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Map(map) => write!(f, "{{{} entries}}", map.len()),
            Value::Record(record) => write!(f, "{}{{..}}", record.class),
            Value::Reference(key) => write!(f, "{}", key),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(v)
    }
}

impl From<EntityKey> for Value {
    fn from(v: EntityKey) -> Self {
        Value::Reference(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Declared type of a mapped property
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    Boolean,
    Integer,
    Float,
    Text,
    /// Element collection
    List(Box<ValueType>),
    /// Dynamic component
    Map,
    /// Embedded component of the named class
    Embedded(&'static str),
    /// To-one association targeting the named entity
    Reference(&'static str),
}

impl ValueType {
    /// Scalar types map onto a single column
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            ValueType::Boolean | ValueType::Integer | ValueType::Float | ValueType::Text
        )
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Boolean => write!(f, "boolean"),
            ValueType::Integer => write!(f, "integer"),
            ValueType::Float => write!(f, "float"),
            ValueType::Text => write!(f, "text"),
            ValueType::List(inner) => write!(f, "list<{}>", inner),
            ValueType::Map => write!(f, "map"),
            ValueType::Embedded(class) => write!(f, "embedded<{}>", class),
            ValueType::Reference(entity) => write!(f, "reference<{}>", entity),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_equals_null() {
        assert_eq!(Value::Null, Value::Null);
        assert_ne!(Value::Null, Value::Int(0));
    }

    #[test]
    fn test_float_bitwise_equality() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
        assert_eq!(Value::Float(1.5), Value::Float(1.5));
    }

    #[test]
    fn test_no_cross_type_equality() {
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Text("1".into()), Value::Int(1));
    }

    #[test]
    fn test_null_or_empty_text() {
        assert!(Value::Null.is_null_or_empty_text());
        assert!(Value::Text(String::new()).is_null_or_empty_text());
        assert!(!Value::Text("x".into()).is_null_or_empty_text());
        assert!(!Value::Int(0).is_null_or_empty_text());
    }

    #[test]
    fn test_record_builder() {
        let record = Record::new("Address")
            .with("street", "Main")
            .with("zip", Value::Null);
        assert_eq!(record.get("street"), Some(&Value::Text("Main".into())));
        assert_eq!(record.get("zip"), Some(&Value::Null));
        assert_eq!(record.get("city"), None);
    }

    #[test]
    fn test_snapshot_serializes_in_insertion_order() {
        let mut snapshot = Snapshot::new();
        snapshot.insert("zeta".into(), Value::Int(1));
        snapshot.insert("alpha".into(), Value::Null);

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.find("zeta").unwrap() < json.find("alpha").unwrap());

        let parsed: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn test_value_type_display() {
        let ty = ValueType::List(Box::new(ValueType::Text));
        assert_eq!(ty.to_string(), "list<text>");
        assert!(ValueType::Integer.is_scalar());
        assert!(!ValueType::Embedded("Address").is_scalar());
    }
}
