//! Conversions between Rust field types and [`Value`]
//!
//! The `#[derive(Persistent)]` macro routes every field access through these
//! traits, so a field type is mappable as soon as it implements all three.

use crate::identity::EntityKey;
use crate::value::{Snapshot, Value, ValueType};

/// Error converting a [`Value`] into a Rust type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("expected {expected}, found {found}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("null is not allowed for a non-optional {expected}")]
    UnexpectedNull { expected: &'static str },

    #[error("value {value} out of range for {target}")]
    OutOfRange { value: i64, target: &'static str },
}

/// Read a field as a [`Value`]
pub trait IntoValue {
    fn to_value(&self) -> Value;
}

/// Build a field from a [`Value`]
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ValueError>;
}

/// Static type information for a field type
pub trait ValueKind {
    /// Whether the field can hold null
    const NULLABLE: bool = false;

    /// Declared property type
    fn value_type() -> ValueType;
}

fn mismatch(expected: &'static str, found: &Value) -> ValueError {
    if found.is_null() {
        ValueError::UnexpectedNull { expected }
    } else {
        ValueError::Mismatch {
            expected,
            found: found.kind(),
        }
    }
}

impl IntoValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(v) => Ok(v),
            other => Err(mismatch("bool", &other)),
        }
    }
}

impl ValueKind for bool {
    fn value_type() -> ValueType {
        ValueType::Boolean
    }
}

impl IntoValue for i64 {
    fn to_value(&self) -> Value {
        Value::Int(*self)
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Int(v) => Ok(v),
            other => Err(mismatch("int", &other)),
        }
    }
}

impl ValueKind for i64 {
    fn value_type() -> ValueType {
        ValueType::Integer
    }
}

impl IntoValue for i32 {
    fn to_value(&self) -> Value {
        Value::Int(*self as i64)
    }
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Int(v) => i32::try_from(v).map_err(|_| ValueError::OutOfRange {
                value: v,
                target: "i32",
            }),
            other => Err(mismatch("int", &other)),
        }
    }
}

impl ValueKind for i32 {
    fn value_type() -> ValueType {
        ValueType::Integer
    }
}

impl IntoValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float(v) => Ok(v),
            Value::Int(v) => Ok(v as f64),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl ValueKind for f64 {
    fn value_type() -> ValueType {
        ValueType::Float
    }
}

impl IntoValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Text(v) => Ok(v),
            other => Err(mismatch("text", &other)),
        }
    }
}

impl ValueKind for String {
    fn value_type() -> ValueType {
        ValueType::Text
    }
}

impl IntoValue for EntityKey {
    fn to_value(&self) -> Value {
        Value::Reference(self.clone())
    }
}

impl FromValue for EntityKey {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Reference(key) => Ok(key),
            other => Err(mismatch("reference", &other)),
        }
    }
}

impl ValueKind for EntityKey {
    // The derive macro overrides this with the target entity named in
    // `#[persistent(reference = "...")]`
    fn value_type() -> ValueType {
        ValueType::Reference("")
    }
}

impl IntoValue for Snapshot {
    fn to_value(&self) -> Value {
        Value::Map(self.clone())
    }
}

impl FromValue for Snapshot {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Map(map) => Ok(map),
            other => Err(mismatch("map", &other)),
        }
    }
}

impl ValueKind for Snapshot {
    fn value_type() -> ValueType {
        ValueType::Map
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: ValueKind> ValueKind for Option<T> {
    const NULLABLE: bool = true;

    fn value_type() -> ValueType {
        T::value_type()
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn to_value(&self) -> Value {
        Value::List(self.iter().map(IntoValue::to_value).collect())
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            // An unloaded or absent collection reads as empty
            Value::Null => Ok(Vec::new()),
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(mismatch("list", &other)),
        }
    }
}

impl<T: ValueKind> ValueKind for Vec<T> {
    const NULLABLE: bool = true;

    fn value_type() -> ValueType {
        ValueType::List(Box::new(T::value_type()))
    }
}
