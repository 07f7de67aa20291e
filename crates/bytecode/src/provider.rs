//! Bytecode provider - the entry point for reflection and proxy services
//!
//! A provider is constructed explicitly and passed by reference. It owns the
//! class registry, the reflection-optimizer cache and the proxy factory
//! factory.

use std::sync::Arc;

use dashmap::DashMap;
use palimpsest_model::ValueType;
use tracing::{debug, trace, warn};

use crate::descriptor::{ClassDescriptor, PersistentClass};
use crate::enhance::{BytecodeEnhancementMetadata, EnhancementSettings};
use crate::error::BytecodeError;
use crate::hash::accessor_key;
use crate::proxy::{DefaultProxyFactoryFactory, ProxyFactoryFactory};
use crate::reflection::ReflectionOptimizer;
use crate::registry::ClassRegistry;

/// Reflection, proxy and enhancement services over registered classes
pub struct BytecodeProvider {
    registry: ClassRegistry,
    optimizers: DashMap<u64, Arc<ReflectionOptimizer>>,
    proxies: Box<dyn ProxyFactoryFactory>,
}

impl Default for BytecodeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl BytecodeProvider {
    pub fn new() -> Self {
        Self::with_proxy_factory_factory(Box::new(DefaultProxyFactoryFactory))
    }

    pub fn with_proxy_factory_factory(proxies: Box<dyn ProxyFactoryFactory>) -> Self {
        Self {
            registry: ClassRegistry::new(),
            optimizers: DashMap::new(),
            proxies,
        }
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    /// Register a generated class
    pub fn register<T: PersistentClass>(&self) -> &'static ClassDescriptor {
        self.registry.register_class::<T>();
        T::class_descriptor()
    }

    pub fn class(&self, name: &str) -> Option<&'static ClassDescriptor> {
        self.registry.class(name)
    }

    pub fn proxy_factory_factory(&self) -> &dyn ProxyFactoryFactory {
        self.proxies.as_ref()
    }

    /// Enhancement metadata for a registered class
    pub fn enhancement_metadata(
        &self,
        entity_name: &str,
        settings: EnhancementSettings,
    ) -> Result<BytecodeEnhancementMetadata, BytecodeError> {
        let descriptor = self.registry.require(entity_name)?;
        Ok(BytecodeEnhancementMetadata::from_descriptor(descriptor, settings))
    }

    /// Reflection optimizer for a class and accessor lists
    ///
    /// Optimizers are cached per (class, getters, setters, types) and shared.
    #[tracing::instrument(skip(self, descriptor, types), fields(class = descriptor.name))]
    pub fn reflection_optimizer(
        &self,
        descriptor: &'static ClassDescriptor,
        getters: &[&str],
        setters: &[&str],
        types: &[ValueType],
    ) -> Result<Arc<ReflectionOptimizer>, BytecodeError> {
        let type_names: Vec<String> = types.iter().map(ToString::to_string).collect();
        let key = accessor_key(descriptor.name, getters, setters, &type_names);

        if let Some(cached) = self.optimizers.get(&key) {
            if cached.matches(descriptor.name, getters, setters) {
                trace!("Reflection optimizer cache hit");
                return Ok(Arc::clone(&cached));
            }
            warn!("Reflection optimizer cache key collision for {}", descriptor.name);
            return ReflectionOptimizer::build(descriptor, getters, setters, types).map(Arc::new);
        }

        let optimizer = Arc::new(ReflectionOptimizer::build(descriptor, getters, setters, types)?);
        self.optimizers.insert(key, Arc::clone(&optimizer));
        debug!("Cached reflection optimizer ({} cached)", self.optimizers.len());
        Ok(optimizer)
    }

    /// Reflection optimizer for a registered class, by name
    pub fn reflection_optimizer_for(
        &self,
        class_name: &str,
        getters: &[&str],
        setters: &[&str],
        types: &[ValueType],
    ) -> Result<Arc<ReflectionOptimizer>, BytecodeError> {
        let descriptor = self.registry.require(class_name)?;
        self.reflection_optimizer(descriptor, getters, setters, types)
    }

    /// Number of cached optimizers
    pub fn cached_optimizers(&self) -> usize {
        self.optimizers.len()
    }

    /// Drop every cached optimizer
    pub fn reset_caches(&self) {
        let count = self.optimizers.len();
        self.optimizers.clear();
        debug!("Reset bytecode provider caches ({} optimizers dropped)", count);
    }
}
