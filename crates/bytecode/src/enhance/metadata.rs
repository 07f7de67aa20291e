//! Per-entity enhancement metadata

use palimpsest_model::{EntityId, EntityKey, SessionId};
use tracing::{debug, trace};

use super::instances::{EntityInstances, InstanceKey};
use super::interceptor::{
    EnhancementAsProxyInterceptor, LazyAttributeLoadingInterceptor, PersistentAttributeInterceptor,
};
use crate::descriptor::ClassDescriptor;
use crate::error::EnhancementError;

/// Lazy-loading switches applied when building metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnhancementSettings {
    /// Track lazy attributes; when off, enhanced classes load eagerly
    pub enable_lazy_initialization: bool,
    /// Allow enhanced instances to stand in as proxies
    pub allow_enhancement_as_proxy: bool,
    /// Fetch through any open session, not only the owning one
    pub allow_load_outside_transaction: bool,
}

impl Default for EnhancementSettings {
    fn default() -> Self {
        Self {
            enable_lazy_initialization: true,
            allow_enhancement_as_proxy: true,
            allow_load_outside_transaction: false,
        }
    }
}

/// Enhancement facts about one entity type, plus the interceptor factory
///
/// Built once per entity type and immutable afterwards. It never owns
/// instances; every per-instance operation takes the [`EntityInstances`]
/// table holding them.
#[derive(Debug, Clone)]
pub struct BytecodeEnhancementMetadata {
    entity_name: String,
    descriptor: Option<&'static ClassDescriptor>,
    enhanced: bool,
    identifier_property: Option<&'static str>,
    lazy_attributes: Vec<&'static str>,
    settings: EnhancementSettings,
}

impl BytecodeEnhancementMetadata {
    /// Metadata for a generated class
    pub fn from_descriptor(descriptor: &'static ClassDescriptor, settings: EnhancementSettings) -> Self {
        let lazy_attributes = if descriptor.enhanced && settings.enable_lazy_initialization {
            descriptor.lazy_property_names().collect()
        } else {
            Vec::new()
        };
        debug!(
            "Enhancement metadata for {}: enhanced={}, lazy={:?}",
            descriptor.name, descriptor.enhanced, lazy_attributes
        );
        Self {
            entity_name: descriptor.name.to_string(),
            descriptor: Some(descriptor),
            enhanced: descriptor.enhanced,
            identifier_property: descriptor.id_property().map(|p| p.name),
            lazy_attributes,
            settings,
        }
    }

    /// Metadata for an entity type with no enhanced class
    pub fn non_enhanced(entity_name: impl Into<String>) -> Self {
        Self {
            entity_name: entity_name.into(),
            descriptor: None,
            enhanced: false,
            identifier_property: None,
            lazy_attributes: Vec::new(),
            settings: EnhancementSettings::default(),
        }
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    pub fn descriptor(&self) -> Option<&'static ClassDescriptor> {
        self.descriptor
    }

    pub fn settings(&self) -> EnhancementSettings {
        self.settings
    }

    /// Whether instances of this type carry an interceptor
    pub fn is_enhanced_for_lazy_loading(&self) -> bool {
        self.enhanced
    }

    pub fn identifier_property(&self) -> Option<&'static str> {
        self.identifier_property
    }

    pub fn lazy_attribute_names(&self) -> &[&'static str] {
        &self.lazy_attributes
    }

    fn require_enhanced(&self) -> Result<(), EnhancementError> {
        if self.enhanced {
            Ok(())
        } else {
            Err(EnhancementError::NotInstrumented(self.entity_name.clone()))
        }
    }

    fn check_instance(&self, instances: &EntityInstances, key: InstanceKey) -> Result<(), EnhancementError> {
        let found = instances.class_name(key)?;
        if found != self.entity_name {
            return Err(EnhancementError::WrongEntityType {
                expected: self.entity_name.clone(),
                found: found.to_string(),
            });
        }
        Ok(())
    }

    /// Build a lazy-attribute interceptor for an instance of this type
    pub fn create_lazy_interceptor(
        &self,
        id: EntityId,
        session: Option<SessionId>,
    ) -> LazyAttributeLoadingInterceptor {
        LazyAttributeLoadingInterceptor::new(
            self.entity_name.clone(),
            id,
            self.lazy_attributes.iter().copied(),
            session,
            self.settings.allow_load_outside_transaction,
        )
    }

    /// Install a lazy-attribute interceptor with every lazy attribute unfetched
    pub fn inject_interceptor(
        &self,
        instances: &mut EntityInstances,
        key: InstanceKey,
        id: EntityId,
        session: Option<SessionId>,
    ) -> Result<(), EnhancementError> {
        self.require_enhanced()?;
        self.check_instance(instances, key)?;
        let interceptor = self.create_lazy_interceptor(id, session);
        trace!(
            "Injecting lazy interceptor into {}#{}",
            self.entity_name,
            interceptor.identifier()
        );
        instances.install(key, PersistentAttributeInterceptor::LazyAttributeLoading(interceptor))
    }

    /// Turn an instance into a stand-in for `entity_key` without loading anything
    pub fn inject_enhanced_entity_as_proxy_interceptor(
        &self,
        instances: &mut EntityInstances,
        key: InstanceKey,
        entity_key: EntityKey,
        session: Option<SessionId>,
    ) -> Result<(), EnhancementError> {
        self.require_enhanced()?;
        if !self.settings.allow_enhancement_as_proxy {
            return Err(EnhancementError::ProxyDisabled(self.entity_name.clone()));
        }
        self.check_instance(instances, key)?;
        if entity_key.entity_name != self.entity_name {
            return Err(EnhancementError::WrongEntityType {
                expected: self.entity_name.clone(),
                found: entity_key.entity_name,
            });
        }

        if let Some(id_property) = self.identifier_property {
            instances.set_raw(key, id_property, entity_key.id.to_value())?;
        }
        debug!("Instance became an enhanced proxy for {}", entity_key);
        let interceptor = EnhancementAsProxyInterceptor {
            key: entity_key,
            identifier_property: self.identifier_property,
            lazy_attributes: self.lazy_attributes.clone(),
            session,
            allow_load_outside_transaction: self.settings.allow_load_outside_transaction,
        };
        instances.install(key, PersistentAttributeInterceptor::EnhancementAsProxy(interceptor))
    }

    /// The instance's interceptor
    ///
    /// Fails with `NotInstrumented` for non-enhanced types; `Ok(None)` means
    /// the instance is enhanced but has no interceptor yet.
    pub fn extract_interceptor<'a>(
        &self,
        instances: &'a EntityInstances,
        key: InstanceKey,
    ) -> Result<Option<&'a PersistentAttributeInterceptor>, EnhancementError> {
        self.require_enhanced()?;
        self.check_instance(instances, key)?;
        Ok(instances.interceptor(key))
    }

    /// The instance's lazy-attribute interceptor, if that is what it carries
    pub fn extract_lazy_interceptor<'a>(
        &self,
        instances: &'a EntityInstances,
        key: InstanceKey,
    ) -> Result<Option<&'a LazyAttributeLoadingInterceptor>, EnhancementError> {
        Ok(self
            .extract_interceptor(instances, key)?
            .and_then(PersistentAttributeInterceptor::as_lazy))
    }

    /// Whether any lazy attribute of the instance is unfetched
    ///
    /// A proxy stand-in has nothing loaded yet.
    pub fn has_unfetched_attributes(&self, instances: &EntityInstances, key: InstanceKey) -> bool {
        if !self.enhanced {
            return false;
        }
        match instances.interceptor(key) {
            Some(PersistentAttributeInterceptor::LazyAttributeLoading(i)) => {
                i.has_any_uninitialized_attributes()
            }
            Some(PersistentAttributeInterceptor::EnhancementAsProxy(_)) => true,
            None => false,
        }
    }

    /// Whether the attribute can be read without a fetch
    pub fn is_attribute_loaded(&self, instances: &EntityInstances, key: InstanceKey, name: &str) -> bool {
        if !self.enhanced {
            return true;
        }
        match instances.interceptor(key) {
            Some(PersistentAttributeInterceptor::LazyAttributeLoading(i)) => i.is_attribute_loaded(name),
            Some(PersistentAttributeInterceptor::EnhancementAsProxy(i)) => {
                i.is_identifier_attribute(name)
            }
            None => true,
        }
    }
}
