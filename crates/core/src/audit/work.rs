//! Audit work units
//!
//! Changes made during one transaction are queued as work units, merged per
//! entity instance and turned into rows when the transaction completes.
//!
//! | queued      | then  | result          |
//! |-------------|-------|-----------------|
//! | Add         | Mod   | Add (new data)  |
//! | Add         | Del   | nothing         |
//! | Mod         | Mod   | Mod (latest)    |
//! | Mod         | Del   | Del             |
//! | Del         | Add   | Mod (new data)  |
//! | Add or Mod  | Owner | Add or Mod, raised flags |
//! | Owner       | Add or Mod | Add or Mod, raised flags |
//! | Del         | Owner | Del             |
//!
//! Owner units carry the full state of an entity whose collection changed.
//! Collection units are never merged.

use indexmap::IndexMap;
use palimpsest_bytecode::Persistent;
use palimpsest_model::{EntityId, EntityKey, Revision, Snapshot, Value};
use serde::Serialize;

use super::{EntityConfiguration, RevisionType};
use crate::config::AuditConfig;
use crate::error::AuditResult;
use crate::mapper::{CollectionChange, ExtendedPropertyMapper};

/// Snapshot key holding the element of a collection row
pub const ELEMENT_KEY: &str = "element";

/// One row of audit history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRow {
    /// Entity name, or collection role for collection rows
    pub entity_name: String,
    pub id: EntityId,
    pub revision: Revision,
    pub revision_type: RevisionType,
    pub data: Snapshot,
}

impl AuditRow {
    pub fn to_json(&self) -> AuditResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Snapshot of one entity instance
#[derive(Debug, Clone, PartialEq)]
pub struct EntityWork {
    pub entity_name: String,
    pub id: EntityId,
    pub data: Snapshot,
}

impl EntityWork {
    fn key(&self) -> EntityKey {
        EntityKey::new(self.entity_name.clone(), self.id.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuditWorkUnit {
    Add(EntityWork),
    Mod(EntityWork),
    Del(EntityWork),
    /// Owner of a changed collection; `flags` are already applied to the data
    CollectionOwner { work: EntityWork, flags: Snapshot },
    Collection(CollectionChange),
}

impl AuditWorkUnit {
    /// Insertion of a new instance
    pub fn add(config: &EntityConfiguration, id: EntityId, state: &dyn Persistent) -> Self {
        let mut data = Snapshot::new();
        config.mapper().map_instances(&mut data, Some(state), None);
        Self::Add(work(config, id, data))
    }

    /// Insertion described by a state array
    pub fn add_state(
        config: &EntityConfiguration,
        id: EntityId,
        names: &[&str],
        state: &[Value],
    ) -> Self {
        let mut data = Snapshot::new();
        config.mapper().map_states(&mut data, names, state, &[]);
        Self::Add(work(config, id, data))
    }

    /// Update of an instance; `None` when nothing audited changed
    pub fn modification(
        config: &EntityConfiguration,
        id: EntityId,
        new: &dyn Persistent,
        old: &dyn Persistent,
    ) -> Option<Self> {
        let mut data = Snapshot::new();
        config
            .mapper()
            .map_instances(&mut data, Some(new), Some(old))
            .then(|| Self::Mod(work(config, id, data)))
    }

    /// Update described by parallel state arrays
    pub fn modification_state(
        config: &EntityConfiguration,
        id: EntityId,
        names: &[&str],
        new_state: &[Value],
        old_state: &[Value],
    ) -> Option<Self> {
        let mut data = Snapshot::new();
        config
            .mapper()
            .map_states(&mut data, names, new_state, old_state)
            .then(|| Self::Mod(work(config, id, data)))
    }

    /// Deletion; the last state is kept only with `store_data_at_delete`
    pub fn deletion(
        config: &EntityConfiguration,
        audit: &AuditConfig,
        id: EntityId,
        state: &dyn Persistent,
    ) -> Self {
        let mapper = config.mapper();
        let mut data = Snapshot::new();
        mapper.map_instances(&mut data, Some(state), None);
        if !audit.store_data_at_delete {
            // Empty name lists every flag column
            let mut flags = Snapshot::new();
            mapper.map_modified_flags_for_collection_change("", &mut flags);
            data.iter_mut()
                .filter(|(key, _)| !flags.contains_key(key.as_str()))
                .for_each(|(_, value)| *value = Value::Null);
        }
        Self::Del(work(config, id, data))
    }

    /// One unit per element change of `collection`
    pub fn collection_changes(
        config: &EntityConfiguration,
        id: &EntityId,
        collection: &str,
        new: &Value,
        old: &Value,
    ) -> Vec<Self> {
        config
            .mapper()
            .map_collection_changes(collection, new, old, id)
            .unwrap_or_default()
            .into_iter()
            .map(Self::Collection)
            .collect()
    }

    /// Owner update recording which collection changed
    ///
    /// The row holds the owner's full `state` with the collection's flags on
    /// top. `None` unless the entity tracks modified flags.
    pub fn collection_owner_change(
        config: &EntityConfiguration,
        id: EntityId,
        collection: &str,
        state: &dyn Persistent,
    ) -> Option<Self> {
        let mapper = config.mapper();
        if !mapper.has_properties_with_modified_flag() {
            return None;
        }
        let mut data = Snapshot::new();
        mapper.map_instances(&mut data, Some(state), None);
        let mut flags = Snapshot::new();
        mapper.map_modified_flags_for_collection_change(collection, &mut flags);
        data.extend(flags.clone());
        Some(Self::CollectionOwner {
            work: work(config, id, data),
            flags,
        })
    }

    pub fn revision_type(&self) -> RevisionType {
        match self {
            Self::Add(_) => RevisionType::Add,
            Self::Mod(_) | Self::CollectionOwner { .. } => RevisionType::Mod,
            Self::Del(_) => RevisionType::Del,
            Self::Collection(change) => change.revision_type,
        }
    }

    fn entity_key(&self) -> Option<EntityKey> {
        match self {
            Self::Add(w) | Self::Mod(w) | Self::Del(w) => Some(w.key()),
            Self::CollectionOwner { work, .. } => Some(work.key()),
            Self::Collection(_) => None,
        }
    }

    /// Combine with a later unit for the same instance
    fn merge(self, next: Self) -> Option<Self> {
        match (self, next) {
            (Self::Add(mut w), Self::CollectionOwner { flags, .. }) => {
                raise_flags(&mut w.data, &flags);
                Some(Self::Add(w))
            }
            (Self::Mod(mut w), Self::CollectionOwner { flags, .. }) => {
                raise_flags(&mut w.data, &flags);
                Some(Self::Mod(w))
            }
            (Self::CollectionOwner { flags, .. }, Self::Add(mut w)) => {
                raise_flags(&mut w.data, &flags);
                Some(Self::Add(w))
            }
            (Self::CollectionOwner { flags, .. }, Self::Mod(mut w)) => {
                raise_flags(&mut w.data, &flags);
                Some(Self::Mod(w))
            }
            (
                Self::CollectionOwner { flags: earlier, .. },
                Self::CollectionOwner {
                    mut work,
                    mut flags,
                },
            ) => {
                raise_flags(&mut work.data, &earlier);
                raise_flags(&mut flags, &earlier);
                Some(Self::CollectionOwner { work, flags })
            }
            (previous @ Self::Del(_), Self::CollectionOwner { .. }) => Some(previous),
            (Self::Add(_), Self::Del(_)) => None,
            (Self::Add(_), Self::Add(w) | Self::Mod(w)) => Some(Self::Add(w)),
            (Self::Del(_), Self::Add(w)) => Some(Self::Mod(w)),
            (previous @ Self::Del(_), Self::Del(_)) => Some(previous),
            (_, next) => Some(next),
        }
    }

    pub fn into_row(self, revision: Revision) -> AuditRow {
        let revision_type = self.revision_type();
        match self {
            Self::Add(w)
            | Self::Mod(w)
            | Self::Del(w)
            | Self::CollectionOwner { work: w, .. } => AuditRow {
                entity_name: w.entity_name,
                id: w.id,
                revision,
                revision_type,
                data: w.data,
            },
            Self::Collection(change) => {
                let mut data = Snapshot::new();
                data.insert(ELEMENT_KEY.to_string(), change.element);
                AuditRow {
                    entity_name: change.role,
                    id: change.owner_id,
                    revision,
                    revision_type,
                    data,
                }
            }
        }
    }
}

/// Set every flag that is raised in `flags`
fn raise_flags(data: &mut Snapshot, flags: &Snapshot) {
    for (name, value) in flags {
        if *value == Value::Bool(true) {
            data.insert(name.clone(), value.clone());
        }
    }
}

fn work(config: &EntityConfiguration, id: EntityId, data: Snapshot) -> EntityWork {
    EntityWork {
        entity_name: config.entity_name.clone(),
        id,
        data,
    }
}

/// Work queued by one transaction
#[derive(Debug, Default)]
pub struct AuditTransaction {
    entities: IndexMap<EntityKey, AuditWorkUnit>,
    collections: Vec<AuditWorkUnit>,
}

impl AuditTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a unit, merging with earlier work on the same instance
    pub fn add_work_unit(&mut self, unit: AuditWorkUnit) {
        let Some(key) = unit.entity_key() else {
            self.collections.push(unit);
            return;
        };

        match self.entities.shift_remove(&key) {
            Some(previous) => {
                let previous_type = previous.revision_type();
                let next_type = unit.revision_type();
                match previous.merge(unit) {
                    Some(merged) => {
                        tracing::trace!(
                            "Merged {:?}+{:?} for {} into {:?}",
                            previous_type,
                            next_type,
                            key,
                            merged.revision_type()
                        );
                        self.entities.insert(key, merged);
                    }
                    None => tracing::trace!(
                        "Dropped work for {} ({:?}+{:?})",
                        key,
                        previous_type,
                        next_type
                    ),
                }
            }
            None => {
                self.entities.insert(key, unit);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entities.len() + self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entity rows followed by collection rows
    pub fn into_rows(self, revision: Revision) -> Vec<AuditRow> {
        self.entities
            .into_values()
            .chain(self.collections)
            .map(|unit| unit.into_row(revision))
            .collect()
    }
}
