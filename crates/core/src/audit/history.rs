//! In-memory audit history

use palimpsest_bytecode::PersistentClass;
use palimpsest_model::{EntityId, EntityKey, Revision, Value};
use parking_lot::RwLock;

use super::work::ELEMENT_KEY;
use super::{AuditRow, EntityConfiguration, RevisionType};
use crate::error::{AuditResult, MappingError};
use crate::mapper::{HistoryReader, MaterializeContext};

/// Audit rows kept in memory, queryable as of any revision
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    rows: RwLock<Vec<AuditRow>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, rows: impl IntoIterator<Item = AuditRow>) {
        let mut stored = self.rows.write();
        let before = stored.len();
        stored.extend(rows);
        tracing::debug!("Recorded {} audit rows", stored.len() - before);
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Rows of one entity instance in recording order
    pub fn rows_for(&self, entity_name: &str, id: &EntityId) -> Vec<AuditRow> {
        self.rows
            .read()
            .iter()
            .filter(|row| row.entity_name == entity_name && &row.id == id)
            .cloned()
            .collect()
    }

    /// Revisions at which an instance changed
    pub fn revisions(&self, entity_name: &str, id: &EntityId) -> Vec<Revision> {
        let mut revisions: Vec<_> = self
            .rows_for(entity_name, id)
            .into_iter()
            .map(|row| row.revision)
            .collect();
        revisions.sort();
        revisions.dedup();
        revisions
    }

    /// Latest row at or before `revision`
    fn latest(&self, entity_name: &str, id: &EntityId, revision: Revision) -> Option<AuditRow> {
        self.rows
            .read()
            .iter()
            .filter(|row| {
                row.entity_name == entity_name && &row.id == id && row.revision <= revision
            })
            .max_by_key(|row| row.revision)
            .cloned()
    }

    /// State of an instance as of `revision`
    ///
    /// `None` when the instance did not exist or was deleted.
    pub fn find<T: PersistentClass + Default>(
        &self,
        config: &EntityConfiguration,
        id: &EntityId,
        revision: Revision,
    ) -> AuditResult<Option<T>> {
        let Some(row) = self.latest(&config.entity_name, id, revision) else {
            return Ok(None);
        };
        if row.revision_type == RevisionType::Del {
            return Ok(None);
        }

        let mut instance = T::default();
        instance
            .set_property(&config.id_property, id.to_value())
            .map_err(|e| MappingError::access(&config.id_property, e))?;

        let ctx = MaterializeContext::new(id, self, revision);
        config
            .mapper()
            .map_to_entity_from_map(&mut instance, &row.data, &ctx)?;
        tracing::trace!("Materialized {}#{} at {}", config.entity_name, id, revision);
        Ok(Some(instance))
    }
}

impl HistoryReader for InMemoryHistory {
    fn resolve_reference(
        &self,
        entity_name: &str,
        id: &Value,
        revision: Revision,
    ) -> Result<Value, MappingError> {
        let id = EntityId::from_value(id).map_err(|e| MappingError::History(e.to_string()))?;
        Ok(match self.latest(entity_name, &id, revision) {
            Some(row) if row.revision_type != RevisionType::Del => {
                Value::Reference(EntityKey::new(entity_name, id))
            }
            _ => Value::Null,
        })
    }

    fn read_collection(
        &self,
        role: &str,
        owner_id: &EntityId,
        revision: Revision,
    ) -> Result<Value, MappingError> {
        let rows = self.rows.read();
        let mut changes: Vec<&AuditRow> = rows
            .iter()
            .filter(|row| row.entity_name == role && &row.id == owner_id && row.revision <= revision)
            .collect();
        changes.sort_by_key(|row| row.revision);

        let mut elements: Vec<Value> = Vec::new();
        for row in changes {
            let element = row.data.get(ELEMENT_KEY).cloned().unwrap_or(Value::Null);
            match row.revision_type {
                RevisionType::Add => elements.push(element),
                RevisionType::Del => {
                    if let Some(position) = elements.iter().position(|e| *e == element) {
                        elements.remove(position);
                    }
                }
                RevisionType::Mod => {}
            }
        }
        Ok(Value::List(elements))
    }
}
