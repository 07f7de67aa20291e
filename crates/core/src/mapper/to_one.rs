//! To-one relation leaf

use palimpsest_bytecode::PropertyAccess;
use palimpsest_model::{PropertyData, Snapshot, Value};

use super::MaterializeContext;
use crate::error::MappingError;

/// Stores the referenced entity's id and resolves it again through history
#[derive(Debug, Clone)]
pub struct ToOnePropertyMapper {
    property: PropertyData,
    target_entity: String,
}

impl ToOnePropertyMapper {
    pub fn new(property: PropertyData, target_entity: impl Into<String>) -> Self {
        Self {
            property,
            target_entity: target_entity.into(),
        }
    }

    pub fn property(&self) -> &PropertyData {
        &self.property
    }

    pub fn target_entity(&self) -> &str {
        &self.target_entity
    }

    /// Id stored for a relation value; bare ids pass through
    fn stored_id(value: &Value) -> Value {
        match value {
            Value::Reference(key) => key.id.to_value(),
            other => other.clone(),
        }
    }

    pub fn map_to_map_from_entity(&self, data: &mut Snapshot, new: &Value, old: &Value) -> bool {
        let new_id = Self::stored_id(new);
        let changed = new_id != Self::stored_id(old);
        data.insert(self.property.name().to_string(), new_id);
        if let Some(flag) = self.property.modified_flag_name() {
            data.insert(flag.to_string(), Value::Bool(changed));
        }
        changed
    }

    pub fn map_to_entity_from_map(
        &self,
        target: &mut dyn PropertyAccess,
        data: &Snapshot,
        ctx: &MaterializeContext<'_>,
    ) -> Result<(), MappingError> {
        let bean = self.property.bean_name();
        let id = data.get(self.property.name()).cloned().unwrap_or(Value::Null);

        let value = if id.is_null() {
            Value::Null
        } else {
            ctx.reader
                .resolve_reference(&self.target_entity, &id, ctx.revision)?
        };

        if value.is_null() && !target.accepts_null(bean) {
            return Ok(());
        }
        target
            .set_property(bean, value)
            .map_err(|e| MappingError::access(self.property.name(), e))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::HistoryReader;
    use palimpsest_model::{EntityId, EntityKey, Revision, ValueType};

    struct Lookup;

    impl HistoryReader for Lookup {
        fn resolve_reference(
            &self,
            entity_name: &str,
            id: &Value,
            _revision: Revision,
        ) -> Result<Value, MappingError> {
            let id = EntityId::from_value(id).map_err(|e| MappingError::History(e.to_string()))?;
            Ok(Value::Reference(EntityKey::new(entity_name, id)))
        }

        fn read_collection(
            &self,
            _role: &str,
            _owner_id: &EntityId,
            _revision: Revision,
        ) -> Result<Value, MappingError> {
            Ok(Value::List(Vec::new()))
        }
    }

    fn mapper() -> ToOnePropertyMapper {
        ToOnePropertyMapper::new(
            PropertyData::new("employer", ValueType::Reference("Company")),
            "Company",
        )
    }

    #[test]
    fn test_stores_referenced_id() {
        let mut data = Snapshot::new();
        let new = Value::Reference(EntityKey::new("Company", 7));
        let old = Value::Reference(EntityKey::new("Company", 7));
        assert!(!mapper().map_to_map_from_entity(&mut data, &new, &old));
        assert_eq!(data.get("employer"), Some(&Value::Int(7)));

        assert!(mapper().map_to_map_from_entity(&mut data, &Value::Null, &old));
        assert_eq!(data.get("employer"), Some(&Value::Null));
    }

    #[test]
    fn test_materialize_resolves_through_reader() {
        let mut data = Snapshot::new();
        data.insert("employer".into(), Value::Int(7));
        let id = EntityId::Int(1);
        let ctx = MaterializeContext::new(&id, &Lookup, Revision(1));

        let mut target = Snapshot::new();
        mapper().map_to_entity_from_map(&mut target, &data, &ctx).unwrap();
        assert_eq!(
            target.get("employer"),
            Some(&Value::Reference(EntityKey::new("Company", 7)))
        );
    }
}
