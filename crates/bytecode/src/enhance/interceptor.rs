//! Per-instance attribute interceptors

use std::collections::HashSet;

use palimpsest_model::{EntityId, EntityKey, SessionId};

/// Interceptor state attached to one enhanced instance
#[derive(Debug, Clone, PartialEq)]
pub enum PersistentAttributeInterceptor {
    /// Tracks which lazy attributes have been fetched
    LazyAttributeLoading(LazyAttributeLoadingInterceptor),
    /// Stands in for an entity known only by key
    EnhancementAsProxy(EnhancementAsProxyInterceptor),
}

impl PersistentAttributeInterceptor {
    pub fn entity_name(&self) -> &str {
        match self {
            Self::LazyAttributeLoading(i) => &i.entity_name,
            Self::EnhancementAsProxy(i) => &i.key.entity_name,
        }
    }

    pub fn identifier(&self) -> &EntityId {
        match self {
            Self::LazyAttributeLoading(i) => &i.id,
            Self::EnhancementAsProxy(i) => &i.key.id,
        }
    }

    pub fn session(&self) -> Option<SessionId> {
        match self {
            Self::LazyAttributeLoading(i) => i.session,
            Self::EnhancementAsProxy(i) => i.session,
        }
    }

    pub fn set_session(&mut self, session: SessionId) {
        match self {
            Self::LazyAttributeLoading(i) => i.session = Some(session),
            Self::EnhancementAsProxy(i) => i.session = Some(session),
        }
    }

    pub fn unset_session(&mut self) {
        match self {
            Self::LazyAttributeLoading(i) => i.session = None,
            Self::EnhancementAsProxy(i) => i.session = None,
        }
    }

    pub fn as_lazy(&self) -> Option<&LazyAttributeLoadingInterceptor> {
        match self {
            Self::LazyAttributeLoading(i) => Some(i),
            Self::EnhancementAsProxy(_) => None,
        }
    }

    pub fn as_lazy_mut(&mut self) -> Option<&mut LazyAttributeLoadingInterceptor> {
        match self {
            Self::LazyAttributeLoading(i) => Some(i),
            Self::EnhancementAsProxy(_) => None,
        }
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self, Self::EnhancementAsProxy(_))
    }
}

/// Lazy-attribute bookkeeping for one instance
#[derive(Debug, Clone, PartialEq)]
pub struct LazyAttributeLoadingInterceptor {
    pub(crate) entity_name: String,
    pub(crate) id: EntityId,
    pub(crate) lazy_attributes: HashSet<String>,
    pub(crate) fetched: HashSet<String>,
    pub(crate) session: Option<SessionId>,
    pub(crate) allow_load_outside_transaction: bool,
    pub(crate) dirty: bool,
}

impl LazyAttributeLoadingInterceptor {
    pub fn new(
        entity_name: impl Into<String>,
        id: EntityId,
        lazy_attributes: impl IntoIterator<Item = impl Into<String>>,
        session: Option<SessionId>,
        allow_load_outside_transaction: bool,
    ) -> Self {
        Self {
            entity_name: entity_name.into(),
            id,
            lazy_attributes: lazy_attributes.into_iter().map(Into::into).collect(),
            fetched: HashSet::new(),
            session,
            allow_load_outside_transaction,
            dirty: false,
        }
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    pub fn identifier(&self) -> &EntityId {
        &self.id
    }

    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    pub fn lazy_attribute_names(&self) -> &HashSet<String> {
        &self.lazy_attributes
    }

    pub fn is_lazy_attribute(&self, name: &str) -> bool {
        self.lazy_attributes.contains(name)
    }

    /// Non-lazy attributes always count as loaded
    pub fn is_attribute_loaded(&self, name: &str) -> bool {
        !self.is_lazy_attribute(name) || self.fetched.contains(name)
    }

    pub fn has_any_uninitialized_attributes(&self) -> bool {
        self.lazy_attributes.len() > self.fetched.len()
    }

    /// Mark a lazy attribute as fetched
    pub fn attribute_initialized(&mut self, name: &str) {
        if self.is_lazy_attribute(name) {
            self.fetched.insert(name.to_string());
        }
    }

    /// Mark every lazy attribute as fetched
    pub fn all_initialized(&mut self) {
        self.fetched = self.lazy_attributes.clone();
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}

/// Stand-in state for an enhanced instance known only by its key
#[derive(Debug, Clone, PartialEq)]
pub struct EnhancementAsProxyInterceptor {
    pub(crate) key: EntityKey,
    pub(crate) identifier_property: Option<&'static str>,
    pub(crate) lazy_attributes: Vec<&'static str>,
    pub(crate) session: Option<SessionId>,
    pub(crate) allow_load_outside_transaction: bool,
}

impl EnhancementAsProxyInterceptor {
    pub fn entity_key(&self) -> &EntityKey {
        &self.key
    }

    /// Reads of the identifier never trigger a load
    pub fn is_identifier_attribute(&self, name: &str) -> bool {
        self.identifier_property == Some(name)
    }

    /// Interceptor that replaces this one once the state is loaded
    pub(crate) fn loaded(&self) -> LazyAttributeLoadingInterceptor {
        LazyAttributeLoadingInterceptor::new(
            self.key.entity_name.clone(),
            self.key.id.clone(),
            self.lazy_attributes.iter().copied(),
            self.session,
            self.allow_load_outside_transaction,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lazy_bookkeeping() {
        let mut interceptor = LazyAttributeLoadingInterceptor::new(
            "Person",
            EntityId::Int(1),
            ["biography", "photo"],
            None,
            false,
        );
        assert!(interceptor.has_any_uninitialized_attributes());
        assert!(interceptor.is_attribute_loaded("name"));
        assert!(!interceptor.is_attribute_loaded("photo"));

        interceptor.attribute_initialized("photo");
        interceptor.attribute_initialized("name");
        assert!(interceptor.is_attribute_loaded("photo"));
        assert!(interceptor.has_any_uninitialized_attributes());

        interceptor.attribute_initialized("biography");
        assert!(!interceptor.has_any_uninitialized_attributes());
    }

    #[test]
    fn test_dirty_flag() {
        let mut interceptor =
            LazyAttributeLoadingInterceptor::new("Person", EntityId::Int(1), ["biography"], None, false);
        assert!(!interceptor.is_dirty());
        interceptor.mark_dirty();
        assert!(interceptor.is_dirty());
        interceptor.clear_dirty();
        assert!(!interceptor.is_dirty());
    }

    #[test]
    fn test_session_association() {
        let mut interceptor = PersistentAttributeInterceptor::EnhancementAsProxy(
            EnhancementAsProxyInterceptor {
                key: EntityKey::new("Person", 3),
                identifier_property: Some("id"),
                lazy_attributes: vec!["biography"],
                session: None,
                allow_load_outside_transaction: false,
            },
        );
        assert_eq!(interceptor.session(), None);
        interceptor.set_session(SessionId(4));
        assert_eq!(interceptor.session(), Some(SessionId(4)));
        assert_eq!(interceptor.entity_name(), "Person");
        assert!(interceptor.as_lazy().is_none());
        interceptor.unset_session();
        assert_eq!(interceptor.session(), None);
    }
}
