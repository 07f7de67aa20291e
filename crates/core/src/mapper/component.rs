//! Embedded component mapper

use palimpsest_bytecode::{ClassDescriptor, PropertyAccess};
use palimpsest_model::{EntityId, PropertyData, Snapshot, Value};

use super::{
    CollectionChange, CompositeMapperBuilder, ExtendedPropertyMapper, MaterializeContext,
    MultiPropertyMapper, PropertyMapper,
};
use crate::error::MappingError;

/// Maps an embeddable; children write flattened into the owner's snapshot
#[derive(Debug, Clone)]
pub struct ComponentPropertyMapper {
    property: PropertyData,
    descriptor: &'static ClassDescriptor,
    delegate: MultiPropertyMapper,
}

impl ComponentPropertyMapper {
    pub fn new(property: PropertyData, descriptor: &'static ClassDescriptor) -> Self {
        Self {
            property,
            descriptor,
            delegate: MultiPropertyMapper::new(),
        }
    }

    pub fn property(&self) -> &PropertyData {
        &self.property
    }

    pub fn descriptor(&self) -> &'static ClassDescriptor {
        self.descriptor
    }

    pub fn delegate(&self) -> &MultiPropertyMapper {
        &self.delegate
    }

    pub fn map_to_map_from_entity(&self, data: &mut Snapshot, new: &Value, old: &Value) -> bool {
        if let Some(flag) = self.property.modified_flag_name() {
            let mut scratch = Snapshot::new();
            let changed = self.delegate.map_to_map_from_entity(&mut scratch, new, old);
            data.insert(flag.to_string(), Value::Bool(changed));
        }
        self.delegate.map_to_map_from_entity(data, new, old)
    }

    /// True when every child is a scalar whose snapshot entry is null
    fn all_null_and_single(&self, data: &Snapshot) -> bool {
        self.delegate.entries().all(|(property, mapper)| {
            matches!(mapper, PropertyMapper::Single(_))
                && data.get(property.name()).map_or(true, Value::is_null)
        })
    }

    pub fn map_to_entity_from_map(
        &self,
        target: &mut dyn PropertyAccess,
        data: &Snapshot,
        ctx: &MaterializeContext<'_>,
    ) -> Result<(), MappingError> {
        let bean = self.property.bean_name();

        if self.all_null_and_single(data) {
            tracing::trace!("Component {} collapsed to null", self.property);
            if target.accepts_null(bean) {
                target
                    .set_property(bean, Value::Null)
                    .map_err(|e| MappingError::access(self.property.name(), e))?;
            }
            return Ok(());
        }

        let mut component =
            self.descriptor
                .instantiate()
                .map_err(|source| MappingError::Instantiation {
                    class: self.descriptor.name.to_string(),
                    property: self.property.name().to_string(),
                    source,
                })?;
        self.delegate
            .map_to_entity_from_map(component.as_access_mut(), data, ctx)?;

        target
            .set_property(bean, Value::Record(component.to_record()))
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
            let contains = self
                .delegate
                .entries()
                .any(|(property, _)| property.name() == collection);
            data.insert(flag.to_string(), Value::Bool(contains));
        }
        self.delegate
            .map_modified_flags_for_collection_change(collection, data);
    }

    pub fn has_properties_with_modified_flag(&self) -> bool {
        self.property.is_using_modified_flag() || self.delegate.has_properties_with_modified_flag()
    }
}

impl ExtendedPropertyMapper for ComponentPropertyMapper {
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

impl CompositeMapperBuilder for ComponentPropertyMapper {
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
