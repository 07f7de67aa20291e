//! Entity identity types

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::convert::ValueError;
use crate::value::Value;

/// Primary key of an entity instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityId {
    Int(i64),
    Text(String),
}

impl EntityId {
    /// Convert to a property value
    pub fn to_value(&self) -> Value {
        match self {
            EntityId::Int(v) => Value::Int(*v),
            EntityId::Text(v) => Value::Text(v.clone()),
        }
    }

    /// Read an identifier from a property value
    pub fn from_value(value: &Value) -> Result<Self, ValueError> {
        match value {
            Value::Int(v) => Ok(EntityId::Int(*v)),
            Value::Text(v) => Ok(EntityId::Text(v.clone())),
            other => Err(ValueError::Mismatch {
                expected: "identifier",
                found: other.kind(),
            }),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Int(v) => write!(f, "{}", v),
            EntityId::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for EntityId {
    fn from(v: i64) -> Self {
        EntityId::Int(v)
    }
}

impl From<i32> for EntityId {
    fn from(v: i32) -> Self {
        EntityId::Int(v as i64)
    }
}

impl From<&str> for EntityId {
    fn from(v: &str) -> Self {
        EntityId::Text(v.to_string())
    }
}

/// Entity name plus identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub entity_name: String,
    pub id: EntityId,
}

impl EntityKey {
    pub fn new(entity_name: impl Into<String>, id: impl Into<EntityId>) -> Self {
        Self {
            entity_name: entity_name.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity_name, self.id)
    }
}

/// Audit revision number
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Revision(pub u64);

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Identity of an open session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_value_conversion() {
        assert_eq!(EntityId::from_value(&Value::Int(7)).unwrap(), EntityId::Int(7));
        assert_eq!(
            EntityId::from_value(&Value::Text("a".into())).unwrap(),
            EntityId::Text("a".into())
        );
        assert!(EntityId::from_value(&Value::Null).is_err());
        assert_eq!(EntityId::Int(3).to_value(), Value::Int(3));
    }

    #[test]
    fn test_entity_key_display() {
        let key = EntityKey::new("Person", 42);
        assert_eq!(key.to_string(), "Person#42");
    }

    #[test]
    fn test_revision_ordering() {
        assert!(Revision(1) < Revision(2));
        assert_eq!(Revision(5).to_string(), "r5");
    }
}
