//! Persistent classes and a scripted session shared by the unit tests

use std::cell::Cell;
use std::collections::HashMap;

use palimpsest_macros::Persistent;
use palimpsest_model::{EntityId, EntityKey, SessionId, Snapshot, Value};

use crate::error::FetchError;
use crate::session::SessionContext;

#[derive(Debug, Clone, Default, PartialEq, Persistent)]
#[persistent(entity = "Address")]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Persistent)]
#[persistent(entity = "Person", enhanced)]
pub struct Person {
    #[persistent(id)]
    pub id: i64,
    pub name: String,
    pub age: i32,
    #[persistent(lazy)]
    pub biography: Option<String>,
    #[persistent(embedded)]
    pub address: Option<Address>,
    #[persistent(reference = "Company")]
    pub employer: Option<EntityKey>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Persistent)]
#[persistent(entity = "Company")]
pub struct Company {
    #[persistent(id)]
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Persistent)]
#[persistent(entity = "Sequence", no_default)]
pub struct Sequence {
    pub next: i64,
}

/// Session answering from in-memory rows
pub struct TestSession {
    id: SessionId,
    open: bool,
    connected: bool,
    failing: bool,
    entities: HashMap<EntityKey, Snapshot>,
    lazy: HashMap<(EntityKey, String), Value>,
    loads: Cell<usize>,
}

impl TestSession {
    pub fn new(id: u64) -> Self {
        Self {
            id: SessionId(id),
            open: true,
            connected: true,
            failing: false,
            entities: HashMap::new(),
            lazy: HashMap::new(),
            loads: Cell::new(0),
        }
    }

    pub fn closed(mut self) -> Self {
        self.open = false;
        self
    }

    pub fn disconnected(mut self) -> Self {
        self.connected = false;
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn with_entity(mut self, key: EntityKey, state: Snapshot) -> Self {
        self.entities.insert(key, state);
        self
    }

    pub fn with_lazy(mut self, key: EntityKey, attribute: &str, value: Value) -> Self {
        self.lazy.insert((key, attribute.to_string()), value);
        self
    }

    /// Number of fetches served so far
    pub fn load_count(&self) -> usize {
        self.loads.get()
    }
}

impl SessionContext for TestSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn load_entity(
        &self,
        entity_name: &str,
        id: &EntityId,
    ) -> Result<Option<Snapshot>, FetchError> {
        if self.failing {
            return Err(FetchError("connection reset".into()));
        }
        self.loads.set(self.loads.get() + 1);
        Ok(self
            .entities
            .get(&EntityKey::new(entity_name, id.clone()))
            .cloned())
    }

    fn load_lazy_attribute(
        &self,
        entity_name: &str,
        id: &EntityId,
        attribute: &str,
    ) -> Result<Value, FetchError> {
        if self.failing {
            return Err(FetchError("connection reset".into()));
        }
        self.loads.set(self.loads.get() + 1);
        Ok(self
            .lazy
            .get(&(EntityKey::new(entity_name, id.clone()), attribute.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}
