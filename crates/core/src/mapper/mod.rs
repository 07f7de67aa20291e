//! Property mapper trees
//!
//! A mapper tree diffs two states of an object into a flat audit snapshot
//! and materializes an object back from such a snapshot.
//!
//! ```text
//!                 Multi (entity root)
//!        ┌──────────┼───────────┬──────────────┐
//!     Single    Component      Map        Collection
//!   name → v    (flattened)  (nested)     (separate rows)
//!                   │           │
//!                 Multi       Multi
//! ```
//!
//! Trees are built once through [`CompositeMapperBuilder`] and are immutable
//! afterwards. A [`SubclassPropertyMapper`] shares its parent's tree through
//! an `Arc`.

mod collection;
mod component;
mod dynamic;
mod multi;
mod reader;
mod single;
mod subclass;
mod to_one;

use palimpsest_bytecode::{ClassDescriptor, Persistent, PropertyAccess};
use palimpsest_model::{EntityId, PropertyData, Snapshot, Value};

use crate::error::MappingError;

pub use collection::{CollectionChange, CollectionPropertyMapper};
pub use component::ComponentPropertyMapper;
pub use dynamic::MultiDynamicComponentMapper;
pub use multi::MultiPropertyMapper;
pub use reader::{HistoryReader, MaterializeContext, NoHistory};
pub use single::SinglePropertyMapper;
pub use subclass::SubclassPropertyMapper;
pub use to_one::ToOnePropertyMapper;

/// Registration surface of composite mappers
pub trait CompositeMapperBuilder {
    /// Register a scalar property
    fn add(&mut self, property: PropertyData) -> Result<(), MappingError>;

    /// Register an embedded component and return its builder
    ///
    /// Adding the same component class under the same name again returns
    /// the existing builder.
    fn add_component(
        &mut self,
        property: PropertyData,
        descriptor: &'static ClassDescriptor,
    ) -> Result<&mut dyn CompositeMapperBuilder, MappingError>;

    /// Register a map-valued component and return its builder
    fn add_dynamic_component(
        &mut self,
        property: PropertyData,
    ) -> Result<&mut dyn CompositeMapperBuilder, MappingError>;

    /// Register a prebuilt mapper
    fn add_composite(
        &mut self,
        property: PropertyData,
        mapper: PropertyMapper,
    ) -> Result<(), MappingError>;
}

/// Mappers that own a set of child properties
pub trait ExtendedPropertyMapper {
    fn properties(&self) -> Vec<&PropertyData>;

    /// Diff parallel state arrays indexed like `names`
    ///
    /// Positions beyond an array's length read as null.
    fn map_states(
        &self,
        data: &mut Snapshot,
        names: &[&str],
        new_state: &[Value],
        old_state: &[Value],
    ) -> bool;
}

/// A node of a mapper tree
#[derive(Debug, Clone)]
pub enum PropertyMapper {
    Single(SinglePropertyMapper),
    Multi(MultiPropertyMapper),
    Component(ComponentPropertyMapper),
    Map(MultiDynamicComponentMapper),
    Subclass(SubclassPropertyMapper),
    ToOne(ToOnePropertyMapper),
    Collection(CollectionPropertyMapper),
}

/// Child property of an object value; null when absent
pub(crate) fn child_value(object: &Value, property: &PropertyData) -> Value {
    let child = match object {
        Value::Record(record) => record.get(property.bean_name()),
        Value::Map(map) => map.get(property.bean_name()),
        _ => None,
    };
    child.cloned().unwrap_or(Value::Null)
}

impl PropertyMapper {
    /// Write the new state into `data` and report whether it differs from
    /// the old state
    pub fn map_to_map_from_entity(&self, data: &mut Snapshot, new: &Value, old: &Value) -> bool {
        match self {
            Self::Single(m) => m.map_to_map_from_entity(data, new, old),
            Self::Multi(m) => m.map_to_map_from_entity(data, new, old),
            Self::Component(m) => m.map_to_map_from_entity(data, new, old),
            Self::Map(m) => m.map_to_map_from_entity(data, new, old),
            Self::Subclass(m) => m.map_to_map_from_entity(data, new, old),
            Self::ToOne(m) => m.map_to_map_from_entity(data, new, old),
            Self::Collection(m) => m.map_to_map_from_entity(data, new, old),
        }
    }

    /// Diff two instances of a persistent class
    pub fn map_instances(
        &self,
        data: &mut Snapshot,
        new: Option<&dyn Persistent>,
        old: Option<&dyn Persistent>,
    ) -> bool {
        let record = |instance: Option<&dyn Persistent>| {
            instance.map_or(Value::Null, |i| Value::Record(i.to_record()))
        };
        self.map_to_map_from_entity(data, &record(new), &record(old))
    }

    /// Populate `target` from a snapshot
    pub fn map_to_entity_from_map(
        &self,
        target: &mut dyn PropertyAccess,
        data: &Snapshot,
        ctx: &MaterializeContext<'_>,
    ) -> Result<(), MappingError> {
        match self {
            Self::Single(m) => m.map_to_entity_from_map(target, data),
            Self::Multi(m) => m.map_to_entity_from_map(target, data, ctx),
            Self::Component(m) => m.map_to_entity_from_map(target, data, ctx),
            Self::Map(m) => m.map_to_entity_from_map(target, data, ctx),
            Self::Subclass(m) => m.map_to_entity_from_map(target, data, ctx),
            Self::ToOne(m) => m.map_to_entity_from_map(target, data, ctx),
            Self::Collection(m) => m.map_to_entity_from_map(target, ctx),
        }
    }

    /// Element-level changes of the collection `name`
    ///
    /// `None` when no mapper in the tree owns `name`; `Some(vec![])` when it
    /// is owned but unchanged.
    pub fn map_collection_changes(
        &self,
        name: &str,
        new: &Value,
        old: &Value,
        owner_id: &EntityId,
    ) -> Option<Vec<CollectionChange>> {
        match self {
            Self::Single(_) | Self::ToOne(_) => None,
            Self::Multi(m) => m.map_collection_changes(name, new, old, owner_id),
            Self::Component(m) => m.map_collection_changes(name, new, old, owner_id),
            Self::Map(m) => m.map_collection_changes(name, new, old, owner_id),
            Self::Subclass(m) => m.map_collection_changes(name, new, old, owner_id),
            Self::Collection(m) => m.map_collection_changes(name, new, old, owner_id),
        }
    }

    pub fn map_modified_flags_for_collection_change(&self, collection: &str, data: &mut Snapshot) {
        match self {
            Self::Single(m) => m.map_modified_flags_for_collection_change(collection, data),
            Self::Multi(m) => m.map_modified_flags_for_collection_change(collection, data),
            Self::Component(m) => m.map_modified_flags_for_collection_change(collection, data),
            Self::Map(m) => m.map_modified_flags_for_collection_change(collection, data),
            Self::Subclass(m) => m.map_modified_flags_for_collection_change(collection, data),
            Self::ToOne(m) => m.map_modified_flags_for_collection_change(collection, data),
            Self::Collection(m) => m.map_modified_flags_for_collection_change(collection, data),
        }
    }

    pub fn has_properties_with_modified_flag(&self) -> bool {
        match self {
            Self::Single(m) => m.has_properties_with_modified_flag(),
            Self::Multi(m) => m.has_properties_with_modified_flag(),
            Self::Component(m) => m.has_properties_with_modified_flag(),
            Self::Map(m) => m.has_properties_with_modified_flag(),
            Self::Subclass(m) => m.has_properties_with_modified_flag(),
            Self::ToOne(m) => m.property().is_using_modified_flag(),
            Self::Collection(m) => m.property().is_using_modified_flag(),
        }
    }

    /// Builder view of composite mappers
    pub fn as_builder(&mut self) -> Option<&mut dyn CompositeMapperBuilder> {
        match self {
            Self::Multi(m) => Some(m),
            Self::Component(m) => Some(m),
            Self::Map(m) => Some(m),
            Self::Subclass(m) => Some(m),
            Self::Single(_) | Self::ToOne(_) | Self::Collection(_) => None,
        }
    }
}

/// Leaves own no properties and map no state arrays
impl ExtendedPropertyMapper for PropertyMapper {
    fn properties(&self) -> Vec<&PropertyData> {
        match self {
            Self::Multi(m) => m.properties(),
            Self::Component(m) => m.properties(),
            Self::Map(m) => m.properties(),
            Self::Subclass(m) => m.properties(),
            Self::Single(_) | Self::ToOne(_) | Self::Collection(_) => Vec::new(),
        }
    }

    fn map_states(
        &self,
        data: &mut Snapshot,
        names: &[&str],
        new_state: &[Value],
        old_state: &[Value],
    ) -> bool {
        match self {
            Self::Multi(m) => m.map_states(data, names, new_state, old_state),
            Self::Component(m) => m.map_states(data, names, new_state, old_state),
            Self::Map(m) => m.map_states(data, names, new_state, old_state),
            Self::Subclass(m) => m.map_states(data, names, new_state, old_state),
            Self::Single(_) | Self::ToOne(_) | Self::Collection(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::audit::RevisionType;
    use crate::fixtures::{Address, Coordinates, Office, Person};
    use palimpsest_bytecode::PersistentClass;
    use palimpsest_model::{EntityKey, Record, Revision, ValueType};

    fn address_mapper() -> MultiPropertyMapper {
        let mut root = MultiPropertyMapper::new();
        root.add(PropertyData::new("name", ValueType::Text)).unwrap();
        let component = root
            .add_component(
                PropertyData::new("address", ValueType::Embedded("Address")),
                Address::class_descriptor(),
            )
            .unwrap();
        for child in ["street", "city", "zip"] {
            component
                .add(PropertyData::new(format!("address_{child}"), ValueType::Text).with_bean_name(child))
                .unwrap();
        }
        root
    }

    fn person(name: &str, address: Option<Address>) -> Person {
        Person {
            id: 1,
            name: name.to_string(),
            address,
            ..Default::default()
        }
    }

    fn oslo() -> Address {
        Address {
            street: Some("Karl Johans gate".into()),
            city: Some("Oslo".into()),
            zip: None,
        }
    }

    fn materialize(mapper: &PropertyMapper, data: &Snapshot) -> Person {
        let id = EntityId::Int(1);
        let ctx = MaterializeContext::new(&id, &NoHistory, Revision(1));
        let mut target = Person::default();
        mapper.map_to_entity_from_map(&mut target, data, &ctx).unwrap();
        target
    }

    #[test]
    fn test_changed_is_symmetric() {
        let mapper = PropertyMapper::Multi(address_mapper());
        let states = [
            None,
            Some(person("Ada", None)),
            Some(person("Ada", Some(oslo()))),
            Some(person("Grace", Some(oslo()))),
        ];
        for a in &states {
            for b in &states {
                let a_dyn = a.as_ref().map(|p| p as &dyn Persistent);
                let b_dyn = b.as_ref().map(|p| p as &dyn Persistent);
                let forward = mapper.map_instances(&mut Snapshot::new(), a_dyn, b_dyn);
                let backward = mapper.map_instances(&mut Snapshot::new(), b_dyn, a_dyn);
                assert_eq!(forward, backward);
                assert_eq!(forward, a != b);
            }
        }
    }

    #[test]
    fn test_component_children_are_flattened() {
        let mapper = PropertyMapper::Multi(address_mapper());
        let mut data = Snapshot::new();
        let new = person("Ada", Some(oslo()));
        mapper.map_instances(&mut data, Some(&new), None);

        assert_eq!(
            data.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["name", "address_street", "address_city", "address_zip"]
        );
        assert_eq!(data.get("address_city"), Some(&Value::from("Oslo")));
    }

    #[test]
    fn test_materialize_is_idempotent_for_scalars() {
        let mapper = PropertyMapper::Multi(address_mapper());
        let original = person("Ada", Some(oslo()));

        let mut data = Snapshot::new();
        mapper.map_instances(&mut data, Some(&original), None);
        let restored = materialize(&mapper, &data);

        assert_eq!(restored.name, original.name);
        assert_eq!(restored.address, original.address);
    }

    #[test]
    fn test_all_null_component_collapses() {
        let mapper = PropertyMapper::Multi(address_mapper());
        let mut data = Snapshot::new();
        mapper.map_instances(&mut data, Some(&person("Ada", Some(Address::default()))), None);
        assert_eq!(data.get("address_street"), Some(&Value::Null));

        let restored = materialize(&mapper, &data);
        assert_eq!(restored.address, None);
    }

    #[test]
    fn test_component_with_relation_does_not_collapse() {
        let mut root = MultiPropertyMapper::new();
        let office = root
            .add_component(
                PropertyData::new("office", ValueType::Embedded("Office")),
                Office::class_descriptor(),
            )
            .unwrap();
        office
            .add(PropertyData::new("office_building", ValueType::Text).with_bean_name("building"))
            .unwrap();
        let landlord = PropertyData::new("office_landlord", ValueType::Reference("Company"))
            .with_bean_name("landlord");
        office
            .add_composite(
                landlord.clone(),
                PropertyMapper::ToOne(ToOnePropertyMapper::new(landlord, "Company")),
            )
            .unwrap();

        let mut data = Snapshot::new();
        data.insert("office_building".into(), Value::Null);
        data.insert("office_landlord".into(), Value::Null);

        let id = EntityId::Int(1);
        let ctx = MaterializeContext::new(&id, &NoHistory, Revision(1));
        let mut target = Snapshot::new();
        PropertyMapper::Multi(root)
            .map_to_entity_from_map(&mut target, &data, &ctx)
            .unwrap();

        let office = target.get("office").and_then(Value::as_record).unwrap();
        assert_eq!(office.class, "Office");
        assert_eq!(office.get("building"), Some(&Value::Null));
    }

    #[test]
    fn test_uninstantiable_component_is_terminal() {
        let mut root = MultiPropertyMapper::new();
        let coordinates = root
            .add_component(
                PropertyData::new("position", ValueType::Embedded("Coordinates")),
                Coordinates::class_descriptor(),
            )
            .unwrap();
        coordinates
            .add(PropertyData::new("position_lat", ValueType::Float).with_bean_name("lat"))
            .unwrap();

        let mut data = Snapshot::new();
        data.insert("position_lat".into(), Value::Float(59.9));

        let id = EntityId::Int(1);
        let ctx = MaterializeContext::new(&id, &NoHistory, Revision(1));
        let err = root
            .map_to_entity_from_map(&mut Snapshot::new(), &data, &ctx)
            .unwrap_err();
        assert!(matches!(err, MappingError::Instantiation { ref class, .. } if class == "Coordinates"));
    }

    #[test]
    fn test_add_component_reentry() {
        let mut root = address_mapper();
        let again = root
            .add_component(
                PropertyData::new("address", ValueType::Embedded("Address")),
                Address::class_descriptor(),
            )
            .unwrap();
        let err = again
            .add(PropertyData::new("address_city", ValueType::Text))
            .unwrap_err();
        assert_eq!(err, MappingError::DuplicateProperty("address_city".to_string()));

        assert!(matches!(
            root.add_component(
                PropertyData::new("address", ValueType::Embedded("Office")),
                Office::class_descriptor(),
            ),
            Err(MappingError::DuplicateProperty(ref name)) if name == "address"
        ));
    }

    fn parent_with_tags() -> Arc<PropertyMapper> {
        let mut parent = MultiPropertyMapper::new();
        parent.add(PropertyData::new("name", ValueType::Text)).unwrap();
        let tags = PropertyData::new("tags", ValueType::List(Box::new(ValueType::Text)));
        parent
            .add_composite(
                tags.clone(),
                PropertyMapper::Collection(CollectionPropertyMapper::new(tags, "Person.tags")),
            )
            .unwrap();
        Arc::new(PropertyMapper::Multi(parent))
    }

    fn subclass_mapper(main_tags_role: &str) -> SubclassPropertyMapper {
        let mut main = MultiPropertyMapper::new();
        main.add(PropertyData::new("salary", ValueType::Integer)).unwrap();
        let tags = PropertyData::new("tags", ValueType::List(Box::new(ValueType::Text)));
        main.add_composite(
            tags.clone(),
            PropertyMapper::Collection(CollectionPropertyMapper::new(tags, main_tags_role)),
        )
        .unwrap();
        SubclassPropertyMapper::new(main, parent_with_tags())
    }

    #[test]
    fn test_subclass_diff_runs_both_mappers() {
        let mapper = subclass_mapper("Employee.tags");
        let new = Value::Record(Record::new("Employee").with("name", "Ada").with("salary", 10i64));
        let old = Value::Record(Record::new("Employee").with("name", "Grace").with("salary", 10i64));

        let mut data = Snapshot::new();
        assert!(mapper.map_to_map_from_entity(&mut data, &new, &old));
        assert_eq!(data.get("name"), Some(&Value::from("Ada")));
        assert_eq!(data.get("salary"), Some(&Value::Int(10)));

        let old = Value::Record(Record::new("Employee").with("name", "Ada").with("salary", 5i64));
        let mut data = Snapshot::new();
        assert!(mapper.map_to_map_from_entity(&mut data, &new, &old));
        assert_eq!(data.len(), 2);
    }

    #[test]
    fn test_subclass_collection_changes_first_match_wins() {
        let mapper = subclass_mapper("Employee.tags");
        let owner = EntityId::Int(1);
        let new = Value::List(vec!["a".into()]);

        let changes = mapper
            .map_collection_changes("tags", &new, &Value::Null, &owner)
            .unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].role, "Person.tags");
        assert_eq!(changes[0].revision_type, RevisionType::Add);

        assert!(mapper
            .map_collection_changes("skills", &new, &Value::Null, &owner)
            .is_none());
    }

    #[test]
    fn test_subclass_properties_union() {
        let mapper = subclass_mapper("Employee.tags");
        let properties = mapper.properties();
        let names: Vec<_> = properties.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["name", "tags", "salary", "tags"]);
    }

    #[test]
    fn test_modified_flags_for_collection_change() {
        let mut root = MultiPropertyMapper::new();
        root.add(PropertyData::new("name", ValueType::Text).with_modified_flag("name_MOD"))
            .unwrap();
        let component = root
            .add_component(
                PropertyData::new("address", ValueType::Embedded("Address"))
                    .with_modified_flag("address_MOD"),
                Address::class_descriptor(),
            )
            .unwrap();
        let phones = PropertyData::new("address_phones", ValueType::List(Box::new(ValueType::Text)))
            .with_bean_name("phones")
            .with_modified_flag("address_phones_MOD");
        component
            .add_composite(
                phones.clone(),
                PropertyMapper::Collection(CollectionPropertyMapper::new(phones, "Person.address.phones")),
            )
            .unwrap();
        let mapper = PropertyMapper::Multi(root);
        assert!(mapper.has_properties_with_modified_flag());

        let mut data = Snapshot::new();
        mapper.map_modified_flags_for_collection_change("address.phones", &mut data);
        assert_eq!(data.get("name_MOD"), Some(&Value::Bool(false)));
        assert_eq!(data.get("address_MOD"), Some(&Value::Bool(true)));
        assert_eq!(data.get("address_phones_MOD"), Some(&Value::Bool(true)));

        let owner = EntityId::Int(1);
        let changes = mapper
            .map_collection_changes(
                "address.phones",
                &Value::List(vec!["555".into()]),
                &Value::Null,
                &owner,
            )
            .unwrap();
        assert_eq!(changes[0].role, "Person.address.phones");
    }

    #[test]
    fn test_component_modified_flag_uses_throwaway_diff() {
        let mut root = MultiPropertyMapper::new();
        let component = root
            .add_component(
                PropertyData::new("address", ValueType::Embedded("Address"))
                    .with_modified_flag("address_MOD"),
                Address::class_descriptor(),
            )
            .unwrap();
        component
            .add(PropertyData::new("address_city", ValueType::Text).with_bean_name("city"))
            .unwrap();
        let mapper = PropertyMapper::Multi(root);

        let mut data = Snapshot::new();
        let new = person("Ada", Some(oslo()));
        let old = new.clone();
        assert!(!mapper.map_instances(&mut data, Some(&new), Some(&old)));
        assert_eq!(data.get("address_MOD"), Some(&Value::Bool(false)));
        assert_eq!(data.len(), 2);
    }

    #[test]
    fn test_to_one_in_entity_tree() {
        let mut root = MultiPropertyMapper::new();
        let employer = PropertyData::new("employer", ValueType::Reference("Company"));
        root.add_composite(
            employer.clone(),
            PropertyMapper::ToOne(ToOnePropertyMapper::new(employer, "Company")),
        )
        .unwrap();
        let mapper = PropertyMapper::Multi(root);

        let mut new = person("Ada", None);
        new.employer = Some(EntityKey::new("Company", 3));
        let mut data = Snapshot::new();
        assert!(mapper.map_instances(&mut data, Some(&new), None));
        assert_eq!(data.get("employer"), Some(&Value::Int(3)));
    }
}
