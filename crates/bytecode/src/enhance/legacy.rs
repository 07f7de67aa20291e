//! Field-interceptor instrumentation contract
//!
//! Older callers speak in terms of "instrumented" entities carrying a field
//! interceptor. This contract is served by an adapter over
//! [`BytecodeEnhancementMetadata`].

use std::collections::HashSet;

use palimpsest_model::{EntityId, SessionId};

use super::instances::{EntityInstances, InstanceKey};
use super::interceptor::{LazyAttributeLoadingInterceptor, PersistentAttributeInterceptor};
use super::metadata::BytecodeEnhancementMetadata;
use crate::error::EnhancementError;

/// Instrumentation facts about one entity type
pub trait EntityInstrumentationMetadata {
    fn entity_name(&self) -> &str;

    fn is_instrumented(&self) -> bool;

    /// Install a field interceptor tracking `uninitialized_fields`
    fn inject_interceptor(
        &self,
        instances: &mut EntityInstances,
        key: InstanceKey,
        id: EntityId,
        uninitialized_fields: &HashSet<String>,
        session: Option<SessionId>,
    ) -> Result<(), EnhancementError>;

    /// The instance's field interceptor
    fn extract_interceptor<'a>(
        &self,
        instances: &'a mut EntityInstances,
        key: InstanceKey,
    ) -> Result<Option<FieldInterceptor<'a>>, EnhancementError>;
}

/// Adapter exposing enhancement metadata through the instrumentation contract
#[derive(Debug, Clone, Copy)]
pub struct InstrumentationAdapter<'m> {
    metadata: &'m BytecodeEnhancementMetadata,
}

impl BytecodeEnhancementMetadata {
    pub fn instrumentation(&self) -> InstrumentationAdapter<'_> {
        InstrumentationAdapter { metadata: self }
    }
}

impl EntityInstrumentationMetadata for InstrumentationAdapter<'_> {
    fn entity_name(&self) -> &str {
        self.metadata.entity_name()
    }

    fn is_instrumented(&self) -> bool {
        self.metadata.is_enhanced_for_lazy_loading()
    }

    fn inject_interceptor(
        &self,
        instances: &mut EntityInstances,
        key: InstanceKey,
        id: EntityId,
        uninitialized_fields: &HashSet<String>,
        session: Option<SessionId>,
    ) -> Result<(), EnhancementError> {
        if !self.is_instrumented() {
            return Err(EnhancementError::NotInstrumented(self.entity_name().to_string()));
        }
        let found = instances.class_name(key)?;
        if found != self.entity_name() {
            return Err(EnhancementError::WrongEntityType {
                expected: self.entity_name().to_string(),
                found: found.to_string(),
            });
        }

        let interceptor = LazyAttributeLoadingInterceptor::new(
            self.entity_name(),
            id,
            uninitialized_fields.iter().cloned(),
            session,
            self.metadata.settings().allow_load_outside_transaction,
        );
        instances.install(key, PersistentAttributeInterceptor::LazyAttributeLoading(interceptor))
    }

    fn extract_interceptor<'a>(
        &self,
        instances: &'a mut EntityInstances,
        key: InstanceKey,
    ) -> Result<Option<FieldInterceptor<'a>>, EnhancementError> {
        if !self.is_instrumented() {
            return Err(EnhancementError::NotInstrumented(self.entity_name().to_string()));
        }
        instances.class_name(key)?;
        Ok(instances
            .interceptor_mut(key)
            .and_then(PersistentAttributeInterceptor::as_lazy_mut)
            .map(|inner| FieldInterceptor { inner }))
    }
}

/// Field-interceptor view of a lazy-attribute interceptor
#[derive(Debug)]
pub struct FieldInterceptor<'a> {
    inner: &'a mut LazyAttributeLoadingInterceptor,
}

impl FieldInterceptor<'_> {
    /// No field is left uninitialized
    pub fn is_initialized(&self) -> bool {
        !self.inner.has_any_uninitialized_attributes()
    }

    pub fn is_initialized_field(&self, field: &str) -> bool {
        self.inner.is_attribute_loaded(field)
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.is_dirty()
    }

    pub fn dirty(&mut self) {
        self.inner.mark_dirty();
    }

    pub fn clear_dirty(&mut self) {
        self.inner.clear_dirty();
    }
}
