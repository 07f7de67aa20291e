//! Runtime class metadata and property access capabilities
//!
//! Rust has no runtime reflection, so every persistent class carries a
//! generated accessor dispatch table instead: a [`ClassDescriptor`] listing
//! its properties in declaration order, each with get/set function pointers
//! that downcast the instance and convert through [`Value`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │            #[derive(Persistent)] on a struct                │
//! │   generates ClassDescriptor + PropertyAccess + Persistent   │
//! └─────────────────────────────┬───────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ClassDescriptor (one per class, OnceLock static)           │
//! │   - ordered PropertyDescriptors (get/set fn pointers)       │
//! │   - optional no-arg constructor                             │
//! │   - enhanced flag, parent entity name                       │
//! └─────────────────────────────────────────────────────────────┘
//!          │                                   │
//!          ▼                                   ▼
//!   ReflectionOptimizer                 property mappers
//!   (positional arrays)                 (by-name PropertyAccess)
//! ```

use std::any::Any;
use std::fmt;

use bitflags::bitflags;
use palimpsest_model::{FromValue, Record, Snapshot, Value, ValueType};

use crate::error::{AccessError, BytecodeError};

bitflags! {
    /// Mapping traits of a property
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PropertyFlags: u32 {
        /// Entity identifier
        const ID = 0x01;
        /// Fetched on first access when the class is enhanced
        const LAZY = 0x02;
        /// Field type can hold null
        const NULLABLE = 0x04;
        /// Excluded from auditing
        const NOT_AUDITED = 0x08;
        /// Embedded component
        const EMBEDDED = 0x10;
        /// To-one association
        const REFERENCE = 0x20;
        /// Element collection
        const COLLECTION = 0x40;
    }
}

/// Reads a property from an instance (None if the instance is of another class)
pub type GetterFn = fn(&dyn Any) -> Option<Value>;

/// Writes a property on an instance
pub type SetterFn = fn(&mut dyn Any, Value) -> Result<(), AccessError>;

/// Creates a default instance
pub type ConstructorFn = fn() -> Box<dyn Persistent>;

/// One entry of a class's accessor table
#[derive(Clone)]
pub struct PropertyDescriptor {
    /// Property name
    pub name: &'static str,
    /// Getter accessor name (the field name)
    pub getter: &'static str,
    /// Setter accessor name (`set_` + field name)
    pub setter: &'static str,
    /// Declared type
    pub value_type: ValueType,
    pub flags: PropertyFlags,
    pub get: GetterFn,
    pub set: SetterFn,
}

impl PropertyDescriptor {
    #[inline]
    pub fn is_id(&self) -> bool {
        self.flags.contains(PropertyFlags::ID)
    }

    #[inline]
    pub fn is_lazy(&self) -> bool {
        self.flags.contains(PropertyFlags::LAZY)
    }

    #[inline]
    pub fn is_nullable(&self) -> bool {
        self.flags.contains(PropertyFlags::NULLABLE)
    }

    #[inline]
    pub fn is_audited(&self) -> bool {
        !self.flags.contains(PropertyFlags::NOT_AUDITED)
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("flags", &self.flags)
            .finish()
    }
}

/// Accessor dispatch table for one persistent class
#[derive(Clone)]
pub struct ClassDescriptor {
    /// Class (entity) name
    pub name: &'static str,
    /// Entity name of the mapped superclass, if any
    pub parent: Option<&'static str>,
    /// Whether instances support lazy-attribute interception
    pub enhanced: bool,
    /// No-arg constructor; `None` when the class has no default
    pub constructor: Option<ConstructorFn>,
    /// Properties in declaration order
    pub properties: Vec<PropertyDescriptor>,
}

impl ClassDescriptor {
    /// Find a property by name
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Position of a property in declaration order
    pub fn property_index(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name == name)
    }

    /// Find a property by its getter accessor name
    pub fn by_getter(&self, getter: &str) -> Option<(usize, &PropertyDescriptor)> {
        self.properties
            .iter()
            .enumerate()
            .find(|(_, p)| p.getter == getter)
    }

    /// Find a property by its setter accessor name
    pub fn by_setter(&self, setter: &str) -> Option<(usize, &PropertyDescriptor)> {
        self.properties
            .iter()
            .enumerate()
            .find(|(_, p)| p.setter == setter)
    }

    /// The identifier property
    pub fn id_property(&self) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.is_id())
    }

    /// Names of lazy properties
    pub fn lazy_property_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.properties
            .iter()
            .filter(|p| p.is_lazy())
            .map(|p| p.name)
    }

    /// Create a default instance
    pub fn instantiate(&self) -> Result<Box<dyn Persistent>, BytecodeError> {
        let constructor = self
            .constructor
            .ok_or_else(|| BytecodeError::NotInstantiable(self.name.to_string()))?;
        Ok(constructor())
    }
}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("enhanced", &self.enhanced)
            .field("instantiable", &self.constructor.is_some())
            .field("properties", &self.properties)
            .finish()
    }
}

/// By-name property access on an object
///
/// Implemented for generated persistent classes, for component [`Record`]s
/// and for dynamic-component maps.
pub trait PropertyAccess {
    /// Name of the object's class
    fn class_name(&self) -> &str;

    /// Read a property
    fn get_property(&self, name: &str) -> Result<Value, AccessError>;

    /// Write a property
    fn set_property(&mut self, name: &str, value: Value) -> Result<(), AccessError>;

    /// Whether null may be written to the property
    ///
    /// Non-nullable (primitive-like) properties are left untouched when a
    /// null is materialized into them.
    fn accepts_null(&self, name: &str) -> bool;
}

/// A generated persistent class instance
pub trait Persistent: PropertyAccess + Any + Send + Sync + fmt::Debug {
    /// Accessor table of the instance's class
    fn descriptor(&self) -> &'static ClassDescriptor;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn as_access(&self) -> &dyn PropertyAccess;

    fn as_access_mut(&mut self) -> &mut dyn PropertyAccess;

    /// Capture the instance state as a record
    fn to_record(&self) -> Record {
        let descriptor = self.descriptor();
        let mut record = Record::new(descriptor.name);
        for property in &descriptor.properties {
            let value = (property.get)(self.as_any()).unwrap_or_default();
            record.fields.insert(property.name.to_string(), value);
        }
        record
    }
}

/// Static side of a generated persistent class
pub trait PersistentClass: Persistent + Sized {
    /// Class (entity) name
    const CLASS_NAME: &'static str;

    /// The class's accessor table
    fn class_descriptor() -> &'static ClassDescriptor;
}

impl dyn Persistent {
    /// Downcast to a concrete class
    pub fn downcast_ref<T: Persistent>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Downcast to a concrete class
    pub fn downcast_mut<T: Persistent>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

impl PropertyAccess for Record {
    fn class_name(&self) -> &str {
        &self.class
    }

    fn get_property(&self, name: &str) -> Result<Value, AccessError> {
        self.fields
            .get(name)
            .cloned()
            .ok_or_else(|| AccessError::unknown(&self.class, name))
    }

    fn set_property(&mut self, name: &str, value: Value) -> Result<(), AccessError> {
        match self.fields.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(AccessError::unknown(&self.class, name)),
        }
    }

    fn accepts_null(&self, _name: &str) -> bool {
        true
    }
}

/// Dynamic components: absent keys read as null, any key may be written
impl PropertyAccess for Snapshot {
    fn class_name(&self) -> &str {
        "map"
    }

    fn get_property(&self, name: &str) -> Result<Value, AccessError> {
        Ok(self.get(name).cloned().unwrap_or_default())
    }

    fn set_property(&mut self, name: &str, value: Value) -> Result<(), AccessError> {
        self.insert(name.to_string(), value);
        Ok(())
    }

    fn accepts_null(&self, _name: &str) -> bool {
        true
    }
}

/// Conversions for `#[persistent(embedded)]` fields
pub mod embedded {
    use super::*;
    use palimpsest_model::ValueError;

    /// Read an optional component as a record value
    pub fn to_value<T: Persistent>(component: &Option<T>) -> Value {
        match component {
            Some(c) => Value::Record(c.to_record()),
            None => Value::Null,
        }
    }

    /// Build an optional component from a record value
    ///
    /// Fields missing from the record keep their default. `owner` and
    /// `property` name the embedding field for error reports.
    pub fn from_value<T: PersistentClass + Default>(
        owner: &str,
        property: &str,
        value: Value,
    ) -> Result<Option<T>, AccessError> {
        match value {
            Value::Null => Ok(None),
            Value::Record(record) => {
                let mut component = T::default();
                for (name, field) in record.fields {
                    if field.is_null() && !component.accepts_null(&name) {
                        continue;
                    }
                    component.set_property(&name, field)?;
                }
                Ok(Some(component))
            }
            other => Err(AccessError::mismatch(
                owner,
                property,
                ValueError::Mismatch {
                    expected: "record",
                    found: other.kind(),
                },
            )),
        }
    }
}

/// Apply a snapshot of property values to an object, skipping absent keys
pub fn apply_state(
    target: &mut dyn PropertyAccess,
    state: &Snapshot,
) -> Result<(), AccessError> {
    for (name, value) in state {
        if value.is_null() && !target.accepts_null(name) {
            continue;
        }
        target.set_property(name, value.clone())?;
    }
    Ok(())
}

/// Convert a field through [`FromValue`], tagging errors with the property
pub fn convert_field<T: FromValue>(
    class: &str,
    property: &str,
    value: Value,
) -> Result<T, AccessError> {
    T::from_value(value).map_err(|e| AccessError::mismatch(class, property, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Address, Person};

    #[test]
    fn test_descriptor_declaration_order() {
        let descriptor = Person::class_descriptor();
        let names: Vec<_> = descriptor.properties.iter().map(|p| p.name).collect();
        assert_eq!(
            names,
            vec!["id", "name", "age", "biography", "address", "employer", "tags"]
        );
        assert!(descriptor.enhanced);
        assert_eq!(descriptor.id_property().map(|p| p.name), Some("id"));
        assert_eq!(descriptor.lazy_property_names().collect::<Vec<_>>(), vec!["biography"]);
    }

    #[test]
    fn test_property_flags() {
        let descriptor = Person::class_descriptor();
        let age = descriptor.property("age").unwrap();
        assert!(!age.is_nullable());
        let address = descriptor.property("address").unwrap();
        assert!(address.flags.contains(PropertyFlags::EMBEDDED | PropertyFlags::NULLABLE));
        assert_eq!(address.value_type, ValueType::Embedded("Address"));
        let employer = descriptor.property("employer").unwrap();
        assert_eq!(employer.value_type, ValueType::Reference("Company"));
    }

    #[test]
    fn test_get_set_by_name() {
        let mut person = Person::default();
        person.set_property("name", Value::from("Ada")).unwrap();
        assert_eq!(person.name, "Ada");
        assert_eq!(person.get_property("name").unwrap(), Value::from("Ada"));

        let err = person.get_property("missing").unwrap_err();
        assert!(matches!(err, AccessError::UnknownProperty { .. }));

        let err = person.set_property("age", Value::from("old")).unwrap_err();
        assert!(matches!(err, AccessError::TypeMismatch { .. }));
    }

    #[test]
    fn test_embedded_round_trip_through_record() {
        let mut person = Person::default();
        let record = Record::new("Address")
            .with("street", "Main")
            .with("city", "Springfield")
            .with("zip", Value::Null);
        person.set_property("address", Value::Record(record)).unwrap();

        let address = person.address.clone().unwrap();
        assert_eq!(address.street.as_deref(), Some("Main"));
        assert_eq!(address.zip, None);

        match person.get_property("address").unwrap() {
            Value::Record(r) => assert_eq!(r.class, Address::CLASS_NAME),
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn test_instantiate() {
        let instance = Person::class_descriptor().instantiate().unwrap();
        assert_eq!(instance.class_name(), "Person");
        assert!(instance.downcast_ref::<Person>().is_some());
    }

    #[test]
    fn test_snapshot_access_reads_absent_as_null() {
        let mut map = Snapshot::new();
        assert_eq!(map.get_property("x").unwrap(), Value::Null);
        map.set_property("x", Value::Int(1)).unwrap();
        assert_eq!(map.get_property("x").unwrap(), Value::Int(1));
    }

    #[test]
    fn test_apply_state_skips_null_on_primitives() {
        let mut person = Person {
            age: 30,
            ..Default::default()
        };
        let mut state = Snapshot::new();
        state.insert("age".into(), Value::Null);
        state.insert("name".into(), Value::from("Grace"));
        apply_state(&mut person, &state).unwrap();
        assert_eq!(person.age, 30);
        assert_eq!(person.name, "Grace");
    }
}
