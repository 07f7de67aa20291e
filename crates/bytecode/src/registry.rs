//! Class registry - descriptors of every persistent class known to a provider

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::descriptor::{ClassDescriptor, PersistentClass};
use crate::error::BytecodeError;

/// Name-keyed store of class descriptors
///
/// Read-mostly: classes are registered at bootstrap and looked up per
/// operation afterwards.
#[derive(Default)]
pub struct ClassRegistry {
    classes: RwLock<HashMap<&'static str, &'static ClassDescriptor>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor
    ///
    /// Returns `false` if a descriptor with the same name was replaced.
    pub fn register(&self, descriptor: &'static ClassDescriptor) -> bool {
        let replaced = self
            .classes
            .write()
            .insert(descriptor.name, descriptor)
            .is_some();
        debug!(
            "Registered class {} ({} properties, enhanced: {})",
            descriptor.name,
            descriptor.properties.len(),
            descriptor.enhanced
        );
        !replaced
    }

    /// Register a generated class
    pub fn register_class<T: PersistentClass>(&self) -> bool {
        self.register(T::class_descriptor())
    }

    /// Look up a descriptor by class name
    pub fn class(&self, name: &str) -> Option<&'static ClassDescriptor> {
        self.classes.read().get(name).copied()
    }

    /// Look up a descriptor, failing when the class is unknown
    pub fn require(&self, name: &str) -> Result<&'static ClassDescriptor, BytecodeError> {
        self.class(name)
            .ok_or_else(|| BytecodeError::UnknownClass(name.to_string()))
    }

    /// Registered class names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.classes.read().keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Address, Person};

    #[test]
    fn test_register_and_lookup() {
        let registry = ClassRegistry::new();
        assert!(registry.register_class::<Person>());
        assert!(registry.register_class::<Address>());
        assert!(!registry.register_class::<Person>());

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["Address", "Person"]);
        assert!(registry.class("Person").is_some());
        assert_eq!(
            registry.require("Missing").unwrap_err(),
            BytecodeError::UnknownClass("Missing".into())
        );
    }
}
