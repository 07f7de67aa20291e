//! Name-to-mapper table, the root of every entity mapping

use indexmap::IndexMap;
use palimpsest_bytecode::{ClassDescriptor, PropertyAccess};
use palimpsest_model::{EntityId, PropertyData, Snapshot, Value};

use super::{
    child_value, CollectionChange, ComponentPropertyMapper, CompositeMapperBuilder,
    ExtendedPropertyMapper, MaterializeContext, MultiDynamicComponentMapper, PropertyMapper,
    SinglePropertyMapper,
};
use crate::error::MappingError;

/// Ordered table of child mappers keyed by property name
#[derive(Debug, Clone, Default)]
pub struct MultiPropertyMapper {
    properties: IndexMap<String, (PropertyData, PropertyMapper)>,
}

impl MultiPropertyMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&PropertyMapper> {
        self.properties.get(name).map(|(_, mapper)| mapper)
    }

    /// Child entries in registration order
    pub fn entries(&self) -> impl Iterator<Item = (&PropertyData, &PropertyMapper)> {
        self.properties.values().map(|(data, mapper)| (data, mapper))
    }

    fn insert(&mut self, property: PropertyData, mapper: PropertyMapper) -> Result<(), MappingError> {
        let name = property.name().to_string();
        if self.properties.contains_key(&name) {
            return Err(MappingError::DuplicateProperty(name));
        }
        tracing::trace!("Mapped property {}", name);
        self.properties.insert(name, (property, mapper));
        Ok(())
    }

    /// Diff two objects child by child
    ///
    /// Both objects null maps nothing. Otherwise every child is mapped and
    /// the results are combined without short-circuiting.
    pub fn map_to_map_from_entity(&self, data: &mut Snapshot, new: &Value, old: &Value) -> bool {
        if new.is_null() && old.is_null() {
            return false;
        }

        let mut changed = false;
        for (property, mapper) in self.properties.values() {
            let new_value = child_value(new, property);
            let old_value = child_value(old, property);
            changed |= mapper.map_to_map_from_entity(data, &new_value, &old_value);
        }
        changed
    }

    pub fn map_to_entity_from_map(
        &self,
        target: &mut dyn PropertyAccess,
        data: &Snapshot,
        ctx: &MaterializeContext<'_>,
    ) -> Result<(), MappingError> {
        for (_, mapper) in self.properties.values() {
            mapper.map_to_entity_from_map(target, data, ctx)?;
        }
        Ok(())
    }

    /// Mapper owning `name` and the name it should see
    ///
    /// `component.prop` addresses `prop` inside the `component` namespace,
    /// where it is registered as `component_prop`.
    fn mapper_and_delegate_name(&self, name: &str) -> Option<(&PropertyMapper, String)> {
        match name.split_once('.') {
            Some((stored, rest)) => self
                .get(stored)
                .map(|mapper| (mapper, format!("{stored}_{rest}"))),
            None => self.get(name).map(|mapper| (mapper, name.to_string())),
        }
    }

    pub fn map_collection_changes(
        &self,
        name: &str,
        new: &Value,
        old: &Value,
        owner_id: &EntityId,
    ) -> Option<Vec<CollectionChange>> {
        let (mapper, delegate_name) = self.mapper_and_delegate_name(name)?;
        mapper.map_collection_changes(&delegate_name, new, old, owner_id)
    }

    /// Set every modified flag in the tree for a change to `collection`
    pub fn map_modified_flags_for_collection_change(&self, collection: &str, data: &mut Snapshot) {
        let collection = collection.replace('.', "_");
        for (_, mapper) in self.properties.values() {
            mapper.map_modified_flags_for_collection_change(&collection, data);
        }
    }

    pub fn has_properties_with_modified_flag(&self) -> bool {
        self.properties
            .values()
            .any(|(property, mapper)| {
                property.is_using_modified_flag() || mapper.has_properties_with_modified_flag()
            })
    }
}

impl ExtendedPropertyMapper for MultiPropertyMapper {
    fn properties(&self) -> Vec<&PropertyData> {
        self.properties.values().map(|(data, _)| data).collect()
    }

    /// Diff parallel state arrays; unregistered names are ignored
    fn map_states(
        &self,
        data: &mut Snapshot,
        names: &[&str],
        new_state: &[Value],
        old_state: &[Value],
    ) -> bool {
        let mut changed = false;
        for (i, name) in names.iter().enumerate() {
            if let Some((_, mapper)) = self.properties.get(*name) {
                let new_value = new_state.get(i).cloned().unwrap_or(Value::Null);
                let old_value = old_state.get(i).cloned().unwrap_or(Value::Null);
                changed |= mapper.map_to_map_from_entity(data, &new_value, &old_value);
            }
        }
        changed
    }
}

impl CompositeMapperBuilder for MultiPropertyMapper {
    fn add(&mut self, property: PropertyData) -> Result<(), MappingError> {
        let mapper = PropertyMapper::Single(SinglePropertyMapper::new(property.clone()));
        self.insert(property, mapper)
    }

    fn add_component(
        &mut self,
        property: PropertyData,
        descriptor: &'static ClassDescriptor,
    ) -> Result<&mut dyn CompositeMapperBuilder, MappingError> {
        let name = property.name().to_string();
        match self.properties.get(&name) {
            Some((_, PropertyMapper::Component(existing)))
                if existing.descriptor().name == descriptor.name =>
            {
                tracing::trace!("Re-entering component {}", name);
            }
            Some(_) => return Err(MappingError::DuplicateProperty(name)),
            None => {
                let mapper = ComponentPropertyMapper::new(property.clone(), descriptor);
                self.insert(property, PropertyMapper::Component(mapper))?;
            }
        }

        match self.properties.get_mut(&name) {
            Some((_, PropertyMapper::Component(component))) => Ok(component),
            _ => Err(MappingError::DuplicateProperty(name)),
        }
    }

    fn add_dynamic_component(
        &mut self,
        property: PropertyData,
    ) -> Result<&mut dyn CompositeMapperBuilder, MappingError> {
        let name = property.name().to_string();
        let mapper = MultiDynamicComponentMapper::new(property.clone());
        self.insert(property, PropertyMapper::Map(mapper))?;

        match self.properties.get_mut(&name) {
            Some((_, PropertyMapper::Map(map))) => Ok(map),
            _ => Err(MappingError::DuplicateProperty(name)),
        }
    }

    fn add_composite(
        &mut self,
        property: PropertyData,
        mapper: PropertyMapper,
    ) -> Result<(), MappingError> {
        self.insert(property, mapper)
    }
}
