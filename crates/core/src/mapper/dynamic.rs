//! Dynamic (map-valued) component mapper

use palimpsest_bytecode::{ClassDescriptor, PropertyAccess};
use palimpsest_model::{EntityId, PropertyData, Snapshot, Value};

use super::{
    CollectionChange, CompositeMapperBuilder, ExtendedPropertyMapper, MaterializeContext,
    MultiPropertyMapper, PropertyMapper,
};
use crate::error::MappingError;

/// Maps a map-valued component into a nested map under its own key
#[derive(Debug, Clone)]
pub struct MultiDynamicComponentMapper {
    property: PropertyData,
    delegate: MultiPropertyMapper,
}

impl MultiDynamicComponentMapper {
    pub fn new(property: PropertyData) -> Self {
        Self {
            property,
            delegate: MultiPropertyMapper::new(),
        }
    }

    pub fn property(&self) -> &PropertyData {
        &self.property
    }

    pub fn delegate(&self) -> &MultiPropertyMapper {
        &self.delegate
    }

    /// A null new map is stored as null rather than an empty map
    pub fn map_to_map_from_entity(&self, data: &mut Snapshot, new: &Value, old: &Value) -> bool {
        let mut nested = Snapshot::new();
        let changed = self.delegate.map_to_map_from_entity(&mut nested, new, old);

        let stored = if new.is_null() {
            Value::Null
        } else {
            Value::Map(nested)
        };
        data.insert(self.property.name().to_string(), stored);
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
        let nested = match data.get(self.property.name()) {
            None | Some(Value::Null) => return Ok(()),
            Some(Value::Map(nested)) => nested,
            Some(other) => {
                return Err(MappingError::UnexpectedValue {
                    property: self.property.name().to_string(),
                    expected: "map",
                    found: other.kind(),
                })
            }
        };

        let mut fresh = Snapshot::new();
        self.delegate.map_to_entity_from_map(&mut fresh, nested, ctx)?;
        target
            .set_property(self.property.bean_name(), Value::Map(fresh))
            .map_err(|e| MappingError::access(self.property.name(), e))
    }

    pub fn map_collection_changes(
        &self,
        name: &str,
        new: &Value,
        old: &Value,
        owner_id: &EntityId,
    ) -> Option<Vec<CollectionChange>> {
        self.delegate.map_collection_changes(name, new, old, owner_id)
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
        self.property.is_using_modified_flag() || self.delegate.has_properties_with_modified_flag()
    }
}

impl ExtendedPropertyMapper for MultiDynamicComponentMapper {
    fn properties(&self) -> Vec<&PropertyData> {
        self.delegate.properties()
    }

    fn map_states(
        &self,
        data: &mut Snapshot,
        names: &[&str],
        new_state: &[Value],
        old_state: &[Value],
    ) -> bool {
        self.delegate.map_states(data, names, new_state, old_state)
    }
}

impl CompositeMapperBuilder for MultiDynamicComponentMapper {
    fn add(&mut self, property: PropertyData) -> Result<(), MappingError> {
        self.delegate.add(property)
    }

    fn add_component(
        &mut self,
        property: PropertyData,
        descriptor: &'static ClassDescriptor,
    ) -> Result<&mut dyn CompositeMapperBuilder, MappingError> {
        self.delegate.add_component(property, descriptor)
    }

    fn add_dynamic_component(
        &mut self,
        property: PropertyData,
    ) -> Result<&mut dyn CompositeMapperBuilder, MappingError> {
        self.delegate.add_dynamic_component(property)
    }

    fn add_composite(
        &mut self,
        property: PropertyData,
        mapper: PropertyMapper,
    ) -> Result<(), MappingError> {
        self.delegate.add_composite(property, mapper)
    }
}
