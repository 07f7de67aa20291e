//! Reflection optimizers - positional bulk access through accessor tables
//!
//! A [`ReflectionOptimizer`] is built from a class descriptor and three
//! parallel lists (getter names, setter names, declared types). Position `i`
//! of every array it reads or writes corresponds to position `i` of those
//! lists; the order is never changed internally.

use palimpsest_model::{Value, ValueType};
use tracing::trace;

use crate::descriptor::{ClassDescriptor, GetterFn, Persistent, SetterFn};
use crate::error::{AccessError, BytecodeError};

/// Instantiation plus bulk property access for one class
#[derive(Debug)]
pub struct ReflectionOptimizer {
    instantiation: InstantiationOptimizer,
    access: AccessOptimizer,
}

impl ReflectionOptimizer {
    /// Validate the accessor lists against the descriptor and build the optimizer
    pub fn build(
        descriptor: &'static ClassDescriptor,
        getters: &[&str],
        setters: &[&str],
        types: &[ValueType],
    ) -> Result<Self, BytecodeError> {
        if getters.len() != setters.len() || getters.len() != types.len() {
            return Err(BytecodeError::BadAccessorCount {
                getters: getters.len(),
                setters: setters.len(),
                types: types.len(),
            });
        }

        let mut slots = Vec::with_capacity(getters.len());
        for ((getter, setter), declared) in getters.iter().zip(setters).zip(types) {
            let (getter_index, property) =
                descriptor
                    .by_getter(getter)
                    .ok_or_else(|| BytecodeError::UnknownAccessor {
                        class: descriptor.name.to_string(),
                        accessor: getter.to_string(),
                    })?;
            let (setter_index, _) =
                descriptor
                    .by_setter(setter)
                    .ok_or_else(|| BytecodeError::UnknownAccessor {
                        class: descriptor.name.to_string(),
                        accessor: setter.to_string(),
                    })?;

            if getter_index != setter_index {
                return Err(BytecodeError::MismatchedAccessors {
                    class: descriptor.name.to_string(),
                    getter: getter.to_string(),
                    setter: setter.to_string(),
                });
            }

            if &property.value_type != declared {
                return Err(BytecodeError::WrongType {
                    class: descriptor.name.to_string(),
                    accessor: getter.to_string(),
                    declared: declared.to_string(),
                    actual: property.value_type.to_string(),
                });
            }

            slots.push(AccessorSlot {
                name: property.name,
                get: property.get,
                set: property.set,
            });
        }

        trace!(
            "Built reflection optimizer for {} over {} accessors",
            descriptor.name,
            slots.len()
        );

        Ok(Self {
            instantiation: InstantiationOptimizer { descriptor },
            access: AccessOptimizer {
                class: descriptor.name,
                getters: getters.iter().map(|g| g.to_string()).collect(),
                setters: setters.iter().map(|s| s.to_string()).collect(),
                slots,
            },
        })
    }

    pub fn instantiation_optimizer(&self) -> &InstantiationOptimizer {
        &self.instantiation
    }

    pub fn access_optimizer(&self) -> &AccessOptimizer {
        &self.access
    }

    /// Whether this optimizer was built for exactly these accessor lists
    pub(crate) fn matches(&self, class: &str, getters: &[&str], setters: &[&str]) -> bool {
        self.access.class == class
            && self.access.getters.iter().map(String::as_str).eq(getters.iter().copied())
            && self.access.setters.iter().map(String::as_str).eq(setters.iter().copied())
    }
}

/// Creates instances through the class's no-arg constructor
#[derive(Debug)]
pub struct InstantiationOptimizer {
    descriptor: &'static ClassDescriptor,
}

impl InstantiationOptimizer {
    pub fn new_instance(&self) -> Result<Box<dyn Persistent>, BytecodeError> {
        self.descriptor.instantiate()
    }
}

struct AccessorSlot {
    name: &'static str,
    get: GetterFn,
    set: SetterFn,
}

/// Parallel-array property access
pub struct AccessOptimizer {
    class: &'static str,
    getters: Vec<String>,
    setters: Vec<String>,
    slots: Vec<AccessorSlot>,
}

impl AccessOptimizer {
    /// Property names in accessor order
    pub fn property_names(&self) -> Vec<&'static str> {
        self.slots.iter().map(|s| s.name).collect()
    }

    /// Read every property, in accessor order
    pub fn property_values(&self, instance: &dyn Persistent) -> Result<Vec<Value>, BytecodeError> {
        let target = instance.as_any();
        self.slots
            .iter()
            .map(|slot| {
                (slot.get)(target)
                    .ok_or_else(|| BytecodeError::from(self.wrong_target(instance)))
            })
            .collect()
    }

    /// Write every property, in accessor order
    pub fn set_property_values(
        &self,
        instance: &mut dyn Persistent,
        values: Vec<Value>,
    ) -> Result<(), BytecodeError> {
        if values.len() != self.slots.len() {
            return Err(BytecodeError::ValueCount {
                expected: self.slots.len(),
                actual: values.len(),
            });
        }
        if instance.descriptor().name != self.class {
            return Err(self.wrong_target(instance).into());
        }

        let target = instance.as_any_mut();
        for (slot, value) in self.slots.iter().zip(values) {
            (slot.set)(target, value)?;
        }
        Ok(())
    }

    fn wrong_target(&self, instance: &dyn Persistent) -> AccessError {
        AccessError::WrongTarget {
            expected: self.class.to_string(),
            found: instance.descriptor().name.to_string(),
        }
    }
}

impl std::fmt::Debug for AccessOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessOptimizer")
            .field("class", &self.class)
            .field("getters", &self.getters)
            .field("setters", &self.setters)
            .finish()
    }
}
