//! Collection leaf and element-level change records

use palimpsest_bytecode::PropertyAccess;
use palimpsest_model::{EntityId, PropertyData, Snapshot, Value};
use serde::Serialize;

use super::MaterializeContext;
use crate::audit::RevisionType;
use crate::error::MappingError;

/// One element added to or removed from a collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionChange {
    /// `"{Entity}.{property}"`
    pub role: String,
    pub owner_id: EntityId,
    pub revision_type: RevisionType,
    pub element: Value,
}

/// Maps a collection-valued property
///
/// Collections contribute nothing to the owner's snapshot; their changes are
/// written as separate rows produced by [`Self::map_collection_changes`].
#[derive(Debug, Clone)]
pub struct CollectionPropertyMapper {
    property: PropertyData,
    role: String,
}

impl CollectionPropertyMapper {
    pub fn new(property: PropertyData, role: impl Into<String>) -> Self {
        Self {
            property,
            role: role.into(),
        }
    }

    pub fn property(&self) -> &PropertyData {
        &self.property
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn map_to_map_from_entity(&self, data: &mut Snapshot, new: &Value, old: &Value) -> bool {
        if let Some(flag) = self.property.modified_flag_name() {
            let changed = !element_difference(elements(new), elements(old)).is_empty()
                || !element_difference(elements(old), elements(new)).is_empty();
            data.insert(flag.to_string(), Value::Bool(changed));
        }
        false
    }

    pub fn map_to_entity_from_map(
        &self,
        target: &mut dyn PropertyAccess,
        ctx: &MaterializeContext<'_>,
    ) -> Result<(), MappingError> {
        let value = ctx
            .reader
            .read_collection(&self.role, ctx.primary_key, ctx.revision)?;
        target
            .set_property(self.property.bean_name(), value)
            .map_err(|e| MappingError::access(self.property.name(), e))
    }

    /// `None` unless `name` is this collection's property
    pub fn map_collection_changes(
        &self,
        name: &str,
        new: &Value,
        old: &Value,
        owner_id: &EntityId,
    ) -> Option<Vec<CollectionChange>> {
        if name != self.property.name() {
            return None;
        }

        let new = elements(new);
        let old = elements(old);
        let added = element_difference(new, old);
        let removed = element_difference(old, new);

        let change = |revision_type, element: &Value| CollectionChange {
            role: self.role.clone(),
            owner_id: owner_id.clone(),
            revision_type,
            element: element.clone(),
        };

        let mut changes: Vec<_> = added
            .into_iter()
            .map(|e| change(RevisionType::Add, e))
            .collect();
        changes.extend(removed.into_iter().map(|e| change(RevisionType::Del, e)));

        tracing::trace!(
            "{} changes for {}#{}",
            changes.len(),
            self.role,
            owner_id
        );
        Some(changes)
    }

    pub fn map_modified_flags_for_collection_change(&self, collection: &str, data: &mut Snapshot) {
        if let Some(flag) = self.property.modified_flag_name() {
            data.insert(
                flag.to_string(),
                Value::Bool(self.property.name() == collection),
            );
        }
    }
}

fn elements(value: &Value) -> &[Value] {
    value.as_list().unwrap_or(&[])
}

/// Elements of `left` not matched by an element of `right`, counting
/// duplicates, in `left` order
fn element_difference<'v>(left: &'v [Value], right: &[Value]) -> Vec<&'v Value> {
    let mut unmatched: Vec<Option<&Value>> = right.iter().map(Some).collect();
    left.iter()
        .filter(|element| {
            match unmatched
                .iter_mut()
                .find(|slot| slot.is_some_and(|candidate| candidate == *element))
            {
                Some(slot) => {
                    *slot = None;
                    false
                }
                None => true,
            }
        })
        .collect()
}
