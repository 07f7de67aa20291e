//! Scalar leaf mapper

use palimpsest_bytecode::PropertyAccess;
use palimpsest_model::{PropertyData, Snapshot, Value};

use crate::error::MappingError;

/// Maps one scalar property to one snapshot key
#[derive(Debug, Clone)]
pub struct SinglePropertyMapper {
    property: PropertyData,
    treat_empty_string_as_null: bool,
}

impl SinglePropertyMapper {
    pub fn new(property: PropertyData) -> Self {
        Self {
            property,
            treat_empty_string_as_null: false,
        }
    }

    /// Null and `""` compare equal when diffing
    pub fn with_empty_string_as_null(mut self, enabled: bool) -> Self {
        self.treat_empty_string_as_null = enabled;
        self
    }

    pub fn property(&self) -> &PropertyData {
        &self.property
    }

    fn are_equal(&self, new: &Value, old: &Value) -> bool {
        if self.treat_empty_string_as_null
            && new.is_null_or_empty_text()
            && old.is_null_or_empty_text()
        {
            return true;
        }
        new == old
    }

    pub fn map_to_map_from_entity(&self, data: &mut Snapshot, new: &Value, old: &Value) -> bool {
        let changed = !self.are_equal(new, old);
        data.insert(self.property.name().to_string(), new.clone());
        if let Some(flag) = self.property.modified_flag_name() {
            data.insert(flag.to_string(), Value::Bool(changed));
        }
        changed
    }

    pub fn map_to_entity_from_map(
        &self,
        target: &mut dyn PropertyAccess,
        data: &Snapshot,
    ) -> Result<(), MappingError> {
        if self.property.is_synthetic() {
            return Ok(());
        }

        let bean = self.property.bean_name();
        let value = data.get(self.property.name()).cloned().unwrap_or(Value::Null);
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

    pub fn has_properties_with_modified_flag(&self) -> bool {
        self.property.is_using_modified_flag()
    }
}
