//! Proxy factories for classes without enhancement
//!
//! Two kinds of proxy are produced:
//!
//! - [`EntityProxy`] stands in for an entity whose identifier is known but
//!   whose state has not been loaded. The first non-identifier access loads
//!   the state through the session.
//! - [`BasicProxy`] is a plain value holder whose property reads and writes
//!   pass straight through to an internal map.

use palimpsest_model::{EntityId, EntityKey, SessionId, Snapshot, Value};
use tracing::debug;

use crate::descriptor::{apply_state, ClassDescriptor, Persistent, PropertyAccess};
use crate::error::{AccessError, BytecodeError, EnhancementError, LazyInitializationError};
use crate::session::{check_session, load_entity_state, SessionContext};

/// Builds proxy factories for persistent classes
pub trait ProxyFactoryFactory: Send + Sync {
    /// Factory for lazy entity proxies of a class
    fn build_proxy_factory(
        &self,
        descriptor: &'static ClassDescriptor,
        allow_load_outside_transaction: bool,
    ) -> Result<ProxyFactory, BytecodeError>;

    /// Factory for pass-through value proxies of a class
    fn build_basic_proxy_factory(
        &self,
        descriptor: &'static ClassDescriptor,
    ) -> Result<BasicProxyFactory, BytecodeError>;
}

/// Default proxy factory factory
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultProxyFactoryFactory;

impl ProxyFactoryFactory for DefaultProxyFactoryFactory {
    fn build_proxy_factory(
        &self,
        descriptor: &'static ClassDescriptor,
        allow_load_outside_transaction: bool,
    ) -> Result<ProxyFactory, BytecodeError> {
        // A proxy must be able to materialize its target
        if descriptor.constructor.is_none() {
            return Err(BytecodeError::NotInstantiable(descriptor.name.to_string()));
        }
        debug!("Built proxy factory for {}", descriptor.name);
        Ok(ProxyFactory {
            descriptor,
            allow_load_outside_transaction,
        })
    }

    fn build_basic_proxy_factory(
        &self,
        descriptor: &'static ClassDescriptor,
    ) -> Result<BasicProxyFactory, BytecodeError> {
        Ok(BasicProxyFactory { descriptor })
    }
}

/// Produces lazy entity proxies for one class
#[derive(Debug, Clone)]
pub struct ProxyFactory {
    descriptor: &'static ClassDescriptor,
    allow_load_outside_transaction: bool,
}

impl ProxyFactory {
    pub fn entity_name(&self) -> &'static str {
        self.descriptor.name
    }

    /// Create an uninitialized proxy for an identifier
    pub fn get_proxy(&self, id: EntityId, session: Option<SessionId>) -> EntityProxy {
        EntityProxy {
            key: EntityKey::new(self.descriptor.name, id),
            descriptor: self.descriptor,
            session,
            allow_load_outside_transaction: self.allow_load_outside_transaction,
            target: None,
        }
    }
}

/// Lazy stand-in for an entity instance
#[derive(Debug)]
pub struct EntityProxy {
    key: EntityKey,
    descriptor: &'static ClassDescriptor,
    session: Option<SessionId>,
    allow_load_outside_transaction: bool,
    target: Option<Box<dyn Persistent>>,
}

impl EntityProxy {
    pub fn identifier(&self) -> &EntityId {
        &self.key.id
    }

    pub fn entity_name(&self) -> &str {
        &self.key.entity_name
    }

    pub fn entity_key(&self) -> &EntityKey {
        &self.key
    }

    pub fn is_uninitialized(&self) -> bool {
        self.target.is_none()
    }

    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    pub fn set_session(&mut self, session: SessionId) {
        self.session = Some(session);
    }

    pub fn unset_session(&mut self) {
        self.session = None;
    }

    /// Load the target state if not yet loaded
    ///
    /// On failure the proxy stays uninitialized.
    pub fn initialize(&mut self, session: &dyn SessionContext) -> Result<(), LazyInitializationError> {
        if self.target.is_some() {
            return Ok(());
        }

        let entity_name = self.key.entity_name.as_str();
        let id = &self.key.id;
        check_session(
            entity_name,
            id,
            self.session,
            session,
            self.allow_load_outside_transaction,
        )?;
        let state = load_entity_state(session, entity_name, id)?;

        let bytecode = |source: BytecodeError| LazyInitializationError::Bytecode {
            entity_name: entity_name.to_string(),
            id: id.clone(),
            source,
        };
        let mut target = self.descriptor.instantiate().map_err(bytecode)?;
        if let Some(id_property) = self.descriptor.id_property() {
            target
                .set_property(id_property.name, id.to_value())
                .map_err(|e| bytecode(e.into()))?;
        }
        apply_state(target.as_access_mut(), &state).map_err(|e| bytecode(e.into()))?;

        debug!("Initialized proxy {}", self.key);
        self.target = Some(target);
        Ok(())
    }

    /// The loaded instance, initializing on first use
    pub fn implementation(
        &mut self,
        session: &dyn SessionContext,
    ) -> Result<&mut dyn Persistent, LazyInitializationError> {
        self.initialize(session)?;
        match self.target.as_deref_mut() {
            Some(target) => Ok(target),
            None => Err(LazyInitializationError::NoSession {
                entity_name: self.key.entity_name.clone(),
                id: self.key.id.clone(),
            }),
        }
    }

    /// Read a property; the identifier is answered without initializing
    pub fn read(&mut self, name: &str, session: &dyn SessionContext) -> Result<Value, EnhancementError> {
        if self.descriptor.id_property().map(|p| p.name) == Some(name) {
            return Ok(self.key.id.to_value());
        }
        let target = self.implementation(session)?;
        Ok(target.get_property(name)?)
    }
}

/// Produces pass-through proxies for one class
#[derive(Debug, Clone)]
pub struct BasicProxyFactory {
    descriptor: &'static ClassDescriptor,
}

impl BasicProxyFactory {
    pub fn class_name(&self) -> &'static str {
        self.descriptor.name
    }

    /// Create a proxy holding the class defaults (null when not instantiable)
    pub fn get_proxy(&self) -> BasicProxy {
        let values = match self.descriptor.instantiate() {
            Ok(instance) => instance.to_record().fields,
            Err(_) => self
                .descriptor
                .properties
                .iter()
                .map(|p| (p.name.to_string(), Value::Null))
                .collect(),
        };
        BasicProxy {
            descriptor: self.descriptor,
            values,
        }
    }
}

/// Value holder whose accessors pass through to an internal map
#[derive(Debug, Clone)]
pub struct BasicProxy {
    descriptor: &'static ClassDescriptor,
    values: Snapshot,
}

impl BasicProxy {
    /// Current property values
    pub fn values(&self) -> &Snapshot {
        &self.values
    }
}

impl PropertyAccess for BasicProxy {
    fn class_name(&self) -> &str {
        self.descriptor.name
    }

    fn get_property(&self, name: &str) -> Result<Value, AccessError> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| AccessError::unknown(self.descriptor.name, name))
    }

    fn set_property(&mut self, name: &str, value: Value) -> Result<(), AccessError> {
        match self.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(AccessError::unknown(self.descriptor.name, name)),
        }
    }

    fn accepts_null(&self, name: &str) -> bool {
        self.descriptor
            .property(name)
            .map(|p| p.is_nullable())
            .unwrap_or(false)
    }
}
