//! Instance table with the interceptor side-table
//!
//! Enhanced instances do not carry their interceptor in a field. The table
//! hands out a stable [`InstanceKey`] per instance and keeps interceptors in
//! a secondary map under the same key, so removing an instance drops its
//! interceptor with it.
//!
//! All attribute access to managed instances goes through the table, which
//! is where lazy fetches and proxy loads happen.

use palimpsest_model::{EntityId, SessionId, Value};
use slotmap::{new_key_type, SecondaryMap, SlotMap};
use tracing::{debug, trace};

use super::interceptor::PersistentAttributeInterceptor;
use super::metadata::BytecodeEnhancementMetadata;
use super::LazinessState;
use crate::descriptor::{apply_state, Persistent};
use crate::error::{BytecodeError, EnhancementError, LazyInitializationError};
use crate::session::{check_session, load_entity_state, SessionContext};

new_key_type! {
    /// Stable handle of a managed instance
    pub struct InstanceKey;
}

/// Managed instances and their interceptors
///
/// Single-owner: access is serialized by the owning session.
#[derive(Default)]
pub struct EntityInstances {
    instances: SlotMap<InstanceKey, Box<dyn Persistent>>,
    interceptors: SecondaryMap<InstanceKey, PersistentAttributeInterceptor>,
}

impl EntityInstances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of an instance without installing an interceptor
    pub fn insert(&mut self, instance: Box<dyn Persistent>) -> InstanceKey {
        self.instances.insert(instance)
    }

    /// Create an instance for `id`
    ///
    /// Enhanced types always get an interceptor: every lazy attribute
    /// unfetched, or all fetched when `eager`.
    pub fn instantiate(
        &mut self,
        metadata: &BytecodeEnhancementMetadata,
        id: EntityId,
        session: Option<SessionId>,
        eager: bool,
    ) -> Result<InstanceKey, EnhancementError> {
        let descriptor = metadata
            .descriptor()
            .ok_or_else(|| BytecodeError::UnknownClass(metadata.entity_name().to_string()))?;
        let mut instance = descriptor.instantiate()?;
        if let Some(id_property) = metadata.identifier_property() {
            instance.set_property(id_property, id.to_value())?;
        }

        let key = self.instances.insert(instance);
        if metadata.is_enhanced_for_lazy_loading() {
            let mut interceptor = metadata.create_lazy_interceptor(id, session);
            if eager {
                interceptor.all_initialized();
            }
            self.interceptors
                .insert(key, PersistentAttributeInterceptor::LazyAttributeLoading(interceptor));
        }
        trace!("Instantiated {} (eager: {})", metadata.entity_name(), eager);
        Ok(key)
    }

    pub fn contains(&self, key: InstanceKey) -> bool {
        self.instances.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Borrow an instance
    pub fn instance(&self, key: InstanceKey) -> Option<&dyn Persistent> {
        self.instances.get(key).map(|i| &**i)
    }

    /// Borrow an instance as its concrete class
    pub fn get<T: Persistent>(&self, key: InstanceKey) -> Option<&T> {
        self.instances.get(key).and_then(|i| i.downcast_ref::<T>())
    }

    /// Remove an instance together with its interceptor
    pub fn remove(&mut self, key: InstanceKey) -> Option<Box<dyn Persistent>> {
        self.interceptors.remove(key);
        self.instances.remove(key)
    }

    pub fn interceptor(&self, key: InstanceKey) -> Option<&PersistentAttributeInterceptor> {
        self.interceptors.get(key)
    }

    pub fn interceptor_mut(&mut self, key: InstanceKey) -> Option<&mut PersistentAttributeInterceptor> {
        self.interceptors.get_mut(key)
    }

    pub(crate) fn class_name(&self, key: InstanceKey) -> Result<&'static str, EnhancementError> {
        self.instances
            .get(key)
            .map(|i| i.descriptor().name)
            .ok_or(EnhancementError::UnknownInstance)
    }

    pub(crate) fn install(
        &mut self,
        key: InstanceKey,
        interceptor: PersistentAttributeInterceptor,
    ) -> Result<(), EnhancementError> {
        if !self.instances.contains_key(key) {
            return Err(EnhancementError::UnknownInstance);
        }
        self.interceptors.insert(key, interceptor);
        Ok(())
    }

    /// Write a property bypassing interception
    pub(crate) fn set_raw(&mut self, key: InstanceKey, name: &str, value: Value) -> Result<(), EnhancementError> {
        let instance = self
            .instances
            .get_mut(key)
            .ok_or(EnhancementError::UnknownInstance)?;
        instance.set_property(name, value)?;
        Ok(())
    }

    /// Current lazy-loading state of an instance
    pub fn laziness_state(&self, key: InstanceKey) -> Result<LazinessState, EnhancementError> {
        let instance = self
            .instances
            .get(key)
            .ok_or(EnhancementError::UnknownInstance)?;
        if !instance.descriptor().enhanced {
            return Ok(LazinessState::NotEnhanced);
        }
        Ok(match self.interceptors.get(key) {
            Some(PersistentAttributeInterceptor::EnhancementAsProxy(_)) => LazinessState::DetachedProxy,
            Some(PersistentAttributeInterceptor::LazyAttributeLoading(i))
                if i.has_any_uninitialized_attributes() =>
            {
                LazinessState::Uninitialized
            }
            _ => LazinessState::Initialized,
        })
    }

    /// Associate the instance's interceptor with a session
    pub fn set_session(&mut self, key: InstanceKey, session: SessionId) -> Result<(), EnhancementError> {
        if !self.instances.contains_key(key) {
            return Err(EnhancementError::UnknownInstance);
        }
        if let Some(interceptor) = self.interceptors.get_mut(key) {
            interceptor.set_session(session);
        }
        Ok(())
    }

    /// Detach the instance's interceptor from its session
    pub fn unset_session(&mut self, key: InstanceKey) -> Result<(), EnhancementError> {
        if !self.instances.contains_key(key) {
            return Err(EnhancementError::UnknownInstance);
        }
        if let Some(interceptor) = self.interceptors.get_mut(key) {
            interceptor.unset_session();
        }
        Ok(())
    }

    /// Read an attribute, fetching it through `session` if it is unloaded
    ///
    /// On a proxy stand-in, the identifier is answered directly and any other
    /// attribute first loads the full state.
    pub fn read_attribute(
        &mut self,
        key: InstanceKey,
        name: &str,
        session: &dyn SessionContext,
    ) -> Result<Value, EnhancementError> {
        if !self.instances.contains_key(key) {
            return Err(EnhancementError::UnknownInstance);
        }

        if let Some(PersistentAttributeInterceptor::EnhancementAsProxy(proxy)) = self.interceptors.get(key) {
            if proxy.is_identifier_attribute(name) {
                return Ok(proxy.entity_key().id.to_value());
            }
            self.load_proxy_state(key, session)?;
        }

        let pending = match self.interceptors.get(key) {
            Some(PersistentAttributeInterceptor::LazyAttributeLoading(i)) if !i.is_attribute_loaded(name) => Some((
                i.entity_name.clone(),
                i.id.clone(),
                i.session,
                i.allow_load_outside_transaction,
            )),
            _ => None,
        };

        if let Some((entity_name, id, owner, allow_outside)) = pending {
            check_session(&entity_name, &id, owner, session, allow_outside)?;
            let value = session
                .load_lazy_attribute(&entity_name, &id, name)
                .map_err(|source| LazyInitializationError::Fetch {
                    entity_name: entity_name.clone(),
                    id: id.clone(),
                    source,
                })?;

            self.set_raw(key, name, value.clone())?;
            if let Some(interceptor) = self.interceptors.get_mut(key).and_then(|i| i.as_lazy_mut()) {
                interceptor.attribute_initialized(name);
                trace!("Fetched lazy attribute {}.{} of #{}", entity_name, name, id);
                if !interceptor.has_any_uninitialized_attributes() {
                    debug!("{}#{} is fully initialized", entity_name, id);
                }
            }
            return Ok(value);
        }

        let instance = self
            .instances
            .get(key)
            .ok_or(EnhancementError::UnknownInstance)?;
        Ok(instance.get_property(name)?)
    }

    /// Write an attribute
    ///
    /// Writing a lazy attribute marks it fetched without loading it. Any
    /// write through an interceptor marks the instance dirty.
    pub fn write_attribute(
        &mut self,
        key: InstanceKey,
        name: &str,
        value: Value,
        session: &dyn SessionContext,
    ) -> Result<(), EnhancementError> {
        if !self.instances.contains_key(key) {
            return Err(EnhancementError::UnknownInstance);
        }

        if let Some(PersistentAttributeInterceptor::EnhancementAsProxy(proxy)) = self.interceptors.get(key) {
            if proxy.is_identifier_attribute(name) {
                return self.set_raw(key, name, value);
            }
            self.load_proxy_state(key, session)?;
        }

        self.set_raw(key, name, value)?;
        if let Some(interceptor) = self.interceptors.get_mut(key).and_then(|i| i.as_lazy_mut()) {
            interceptor.attribute_initialized(name);
            interceptor.mark_dirty();
        }
        Ok(())
    }

    /// Load the full state behind a proxy stand-in
    ///
    /// Lazy attributes stay unfetched; the proxy interceptor is replaced by a
    /// lazy-attribute interceptor. On failure nothing changes.
    fn load_proxy_state(&mut self, key: InstanceKey, session: &dyn SessionContext) -> Result<(), EnhancementError> {
        let proxy = match self.interceptors.get(key) {
            Some(PersistentAttributeInterceptor::EnhancementAsProxy(p)) => p.clone(),
            _ => return Ok(()),
        };
        let entity_key = proxy.entity_key();

        check_session(
            &entity_key.entity_name,
            &entity_key.id,
            proxy.session,
            session,
            proxy.allow_load_outside_transaction,
        )?;
        let mut state = load_entity_state(session, &entity_key.entity_name, &entity_key.id)?;
        state.retain(|name, _| !proxy.lazy_attributes.iter().any(|lazy| *lazy == name.as_str()));

        let instance = self
            .instances
            .get_mut(key)
            .ok_or(EnhancementError::UnknownInstance)?;
        apply_state(instance.as_access_mut(), &state)?;

        debug!("Loaded state of enhanced proxy {}", entity_key);
        self.interceptors
            .insert(key, PersistentAttributeInterceptor::LazyAttributeLoading(proxy.loaded()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::PersistentClass;
    use crate::enhance::EnhancementSettings;
    use crate::fixtures::{Company, Person, TestSession};
    use palimpsest_model::{EntityKey, Snapshot};

    fn person_metadata() -> BytecodeEnhancementMetadata {
        BytecodeEnhancementMetadata::from_descriptor(Person::class_descriptor(), EnhancementSettings::default())
    }

    fn session_with_biography() -> TestSession {
        TestSession::new(1).with_lazy(EntityKey::new("Person", 1), "biography", Value::from("Born in 1815"))
    }

    #[test]
    fn test_instantiate_uninitialized() {
        let metadata = person_metadata();
        let mut instances = EntityInstances::new();
        let key = instances
            .instantiate(&metadata, EntityId::Int(1), Some(SessionId(1)), false)
            .unwrap();

        assert_eq!(instances.get::<Person>(key).unwrap().id, 1);
        assert_eq!(instances.laziness_state(key).unwrap(), LazinessState::Uninitialized);
        assert!(metadata.has_unfetched_attributes(&instances, key));
    }

    #[test]
    fn test_instantiate_eager() {
        let metadata = person_metadata();
        let mut instances = EntityInstances::new();
        let key = instances
            .instantiate(&metadata, EntityId::Int(1), None, true)
            .unwrap();
        assert_eq!(instances.laziness_state(key).unwrap(), LazinessState::Initialized);
        assert!(instances.interceptor(key).is_some());
    }

    #[test]
    fn test_non_enhanced_has_no_interceptor() {
        let metadata =
            BytecodeEnhancementMetadata::from_descriptor(Company::class_descriptor(), EnhancementSettings::default());
        let mut instances = EntityInstances::new();
        let key = instances
            .instantiate(&metadata, EntityId::Int(2), None, false)
            .unwrap();
        assert_eq!(instances.laziness_state(key).unwrap(), LazinessState::NotEnhanced);
        assert!(instances.interceptor(key).is_none());
    }

    #[test]
    fn test_lazy_fetch_on_first_read() {
        let metadata = person_metadata();
        let session = session_with_biography();
        let mut instances = EntityInstances::new();
        let key = instances
            .instantiate(&metadata, EntityId::Int(1), Some(SessionId(1)), false)
            .unwrap();

        let value = instances.read_attribute(key, "biography", &session).unwrap();
        assert_eq!(value, Value::from("Born in 1815"));
        assert_eq!(instances.get::<Person>(key).unwrap().biography.as_deref(), Some("Born in 1815"));
        assert!(metadata.is_attribute_loaded(&instances, key, "biography"));
        assert_eq!(instances.laziness_state(key).unwrap(), LazinessState::Initialized);

        // Second read is served from the instance
        instances.read_attribute(key, "biography", &session).unwrap();
        assert_eq!(session.load_count(), 1);
    }

    #[test]
    fn test_non_lazy_read_does_not_fetch() {
        let metadata = person_metadata();
        let session = TestSession::new(1);
        let mut instances = EntityInstances::new();
        let key = instances
            .instantiate(&metadata, EntityId::Int(1), None, false)
            .unwrap();
        assert_eq!(instances.read_attribute(key, "age", &session).unwrap(), Value::Int(0));
        assert_eq!(session.load_count(), 0);
    }

    #[test]
    fn test_fetch_failures_leave_state_unchanged() {
        let metadata = person_metadata();
        let mut instances = EntityInstances::new();
        let key = instances
            .instantiate(&metadata, EntityId::Int(1), None, false)
            .unwrap();

        let err = instances
            .read_attribute(key, "biography", &session_with_biography())
            .unwrap_err();
        assert_eq!(
            err,
            EnhancementError::LazyInitialization(LazyInitializationError::NoSession {
                entity_name: "Person".into(),
                id: EntityId::Int(1),
            })
        );
        assert_eq!(instances.laziness_state(key).unwrap(), LazinessState::Uninitialized);

        instances.set_session(key, SessionId(1)).unwrap();
        let err = instances
            .read_attribute(key, "biography", &TestSession::new(1).closed())
            .unwrap_err();
        assert!(matches!(
            err,
            EnhancementError::LazyInitialization(LazyInitializationError::SessionClosed { .. })
        ));

        let err = instances
            .read_attribute(key, "biography", &TestSession::new(1).failing())
            .unwrap_err();
        assert!(matches!(
            err,
            EnhancementError::LazyInitialization(LazyInitializationError::Fetch { .. })
        ));
        assert!(!metadata.is_attribute_loaded(&instances, key, "biography"));
    }

    #[test]
    fn test_unset_session_blocks_fetch() {
        let metadata = person_metadata();
        let session = session_with_biography();
        let mut instances = EntityInstances::new();
        let key = instances
            .instantiate(&metadata, EntityId::Int(1), Some(SessionId(1)), false)
            .unwrap();
        instances.unset_session(key).unwrap();
        assert!(instances.read_attribute(key, "biography", &session).is_err());
    }

    #[test]
    fn test_load_outside_transaction() {
        let metadata = BytecodeEnhancementMetadata::from_descriptor(
            Person::class_descriptor(),
            EnhancementSettings {
                allow_load_outside_transaction: true,
                ..Default::default()
            },
        );
        let session = session_with_biography();
        let mut instances = EntityInstances::new();
        let key = instances
            .instantiate(&metadata, EntityId::Int(1), None, false)
            .unwrap();
        assert!(instances.read_attribute(key, "biography", &session).is_ok());
    }

    #[test]
    fn test_write_lazy_attribute_marks_fetched_and_dirty() {
        let metadata = person_metadata();
        let session = TestSession::new(1);
        let mut instances = EntityInstances::new();
        let key = instances
            .instantiate(&metadata, EntityId::Int(1), Some(SessionId(1)), false)
            .unwrap();

        instances
            .write_attribute(key, "biography", Value::from("Rewritten"), &session)
            .unwrap();
        let interceptor = metadata.extract_lazy_interceptor(&instances, key).unwrap().unwrap();
        assert!(interceptor.is_attribute_loaded("biography"));
        assert!(interceptor.is_dirty());
        assert_eq!(session.load_count(), 0);
        assert_eq!(
            instances.read_attribute(key, "biography", &session).unwrap(),
            Value::from("Rewritten")
        );
    }

    #[test]
    fn test_enhanced_proxy_lifecycle() {
        let metadata = person_metadata();
        let mut row = Snapshot::new();
        row.insert("name".into(), Value::from("Ada"));
        row.insert("age".into(), Value::Int(36));
        row.insert("biography".into(), Value::from("should not be applied"));
        let session = TestSession::new(1).with_entity(EntityKey::new("Person", 9), row);

        let mut instances = EntityInstances::new();
        let key = instances.insert(Box::new(Person::default()));
        metadata
            .inject_enhanced_entity_as_proxy_interceptor(
                &mut instances,
                key,
                EntityKey::new("Person", 9),
                Some(SessionId(1)),
            )
            .unwrap();
        assert_eq!(instances.laziness_state(key).unwrap(), LazinessState::DetachedProxy);
        assert!(metadata.has_unfetched_attributes(&instances, key));

        assert_eq!(instances.read_attribute(key, "id", &session).unwrap(), Value::Int(9));
        assert_eq!(session.load_count(), 0);

        assert_eq!(instances.read_attribute(key, "name", &session).unwrap(), Value::from("Ada"));
        assert_eq!(session.load_count(), 1);
        assert_eq!(instances.laziness_state(key).unwrap(), LazinessState::Uninitialized);
        let person = instances.get::<Person>(key).unwrap();
        assert_eq!(person.age, 36);
        assert_eq!(person.biography, None);
    }

    #[test]
    fn test_proxy_load_missing_row() {
        let metadata = person_metadata();
        let session = TestSession::new(1);
        let mut instances = EntityInstances::new();
        let key = instances.insert(Box::new(Person::default()));
        metadata
            .inject_enhanced_entity_as_proxy_interceptor(
                &mut instances,
                key,
                EntityKey::new("Person", 404),
                Some(SessionId(1)),
            )
            .unwrap();

        let err = instances.read_attribute(key, "name", &session).unwrap_err();
        assert!(matches!(
            err,
            EnhancementError::LazyInitialization(LazyInitializationError::EntityNotFound { .. })
        ));
        assert_eq!(instances.laziness_state(key).unwrap(), LazinessState::DetachedProxy);
    }

    #[test]
    fn test_remove_drops_interceptor() {
        let metadata = person_metadata();
        let mut instances = EntityInstances::new();
        let key = instances
            .instantiate(&metadata, EntityId::Int(1), None, false)
            .unwrap();
        assert!(instances.remove(key).is_some());
        assert!(instances.interceptor(key).is_none());
        assert_eq!(
            instances.laziness_state(key).unwrap_err(),
            EnhancementError::UnknownInstance
        );
    }
}
