//! Subclass mapper over a shared parent tree

use std::sync::Arc;

use palimpsest_bytecode::{ClassDescriptor, PropertyAccess};
use palimpsest_model::{EntityId, PropertyData, Snapshot, Value};

use super::{
    CollectionChange, CompositeMapperBuilder, ExtendedPropertyMapper, MaterializeContext,
    MultiPropertyMapper, PropertyMapper,
};
use crate::error::MappingError;

/// Combines the properties a subclass declares with its parent's mapper
///
/// Registration only reaches `main`; the parent tree is shared and never
/// modified through a subclass.
#[derive(Debug, Clone)]
pub struct SubclassPropertyMapper {
    main: MultiPropertyMapper,
    parent: Arc<PropertyMapper>,
}

impl SubclassPropertyMapper {
    pub fn new(main: MultiPropertyMapper, parent: Arc<PropertyMapper>) -> Self {
        Self { main, parent }
    }

    pub fn main(&self) -> &MultiPropertyMapper {
        &self.main
    }

    pub fn parent(&self) -> &Arc<PropertyMapper> {
        &self.parent
    }

    /// Parent and main are both always evaluated
    pub fn map_to_map_from_entity(&self, data: &mut Snapshot, new: &Value, old: &Value) -> bool {
        let parent_changed = self.parent.map_to_map_from_entity(data, new, old);
        let main_changed = self.main.map_to_map_from_entity(data, new, old);
        parent_changed | main_changed
    }

    pub fn map_to_entity_from_map(
        &self,
        target: &mut dyn PropertyAccess,
        data: &Snapshot,
        ctx: &MaterializeContext<'_>,
    ) -> Result<(), MappingError> {
        self.parent.map_to_entity_from_map(target, data, ctx)?;
        self.main.map_to_entity_from_map(target, data, ctx)
    }

    /// First match wins: main is consulted only when the parent has no
    /// mapper for `name`
    pub fn map_collection_changes(
        &self,
        name: &str,
        new: &Value,
        old: &Value,
        owner_id: &EntityId,
    ) -> Option<Vec<CollectionChange>> {
        self.parent
            .map_collection_changes(name, new, old, owner_id)
            .or_else(|| self.main.map_collection_changes(name, new, old, owner_id))
    }

    pub fn map_modified_flags_for_collection_change(&self, collection: &str, data: &mut Snapshot) {
        self.parent
            .map_modified_flags_for_collection_change(collection, data);
        self.main
            .map_modified_flags_for_collection_change(collection, data);
    }

    pub fn has_properties_with_modified_flag(&self) -> bool {
        self.parent.has_properties_with_modified_flag() || self.main.has_properties_with_modified_flag()
    }
}

impl ExtendedPropertyMapper for SubclassPropertyMapper {
    fn properties(&self) -> Vec<&PropertyData> {
        let mut properties = self.parent.properties();
        properties.extend(self.main.properties());
        properties
    }

    fn map_states(
        &self,
        data: &mut Snapshot,
        names: &[&str],
        new_state: &[Value],
        old_state: &[Value],
    ) -> bool {
        let parent_changed = self.parent.map_states(data, names, new_state, old_state);
        let main_changed = self.main.map_states(data, names, new_state, old_state);
        parent_changed | main_changed
    }
}

impl CompositeMapperBuilder for SubclassPropertyMapper {
    fn add(&mut self, property: PropertyData) -> Result<(), MappingError> {
        self.main.add(property)
    }

    fn add_component(
        &mut self,
        property: PropertyData,
        descriptor: &'static ClassDescriptor,
    ) -> Result<&mut dyn CompositeMapperBuilder, MappingError> {
        self.main.add_component(property, descriptor)
    }

    fn add_dynamic_component(
        &mut self,
        property: PropertyData,
    ) -> Result<&mut dyn CompositeMapperBuilder, MappingError> {
        self.main.add_dynamic_component(property)
    }

    fn add_composite(
        &mut self,
        property: PropertyData,
        mapper: PropertyMapper,
    ) -> Result<(), MappingError> {
        self.main.add_composite(property, mapper)
    }
}
