//! Audit metadata bootstrap
//!
//! Each audited entity gets a mapper tree built from its class descriptor:
//!
//! - `ID` and `NOT_AUDITED` properties are skipped
//! - embedded properties become components whose children are stored as
//!   `{component}_{child}`
//! - references become to-one mappers holding the target id
//! - lists become collection mappers with role `{Entity}.{path}`
//!
//! Subclasses map only what their parent does not declare and share the
//! parent's tree. Parents must be added first.

use std::sync::Arc;

use indexmap::IndexMap;
use palimpsest_bytecode::{ClassDescriptor, ClassRegistry, PropertyDescriptor};
use palimpsest_model::{PropertyData, ValueType};

use crate::config::AuditConfig;
use crate::error::{AuditError, AuditResult};
use crate::mapper::{
    CollectionPropertyMapper, CompositeMapperBuilder, ExtendedPropertyMapper, MultiPropertyMapper,
    PropertyMapper, SinglePropertyMapper, SubclassPropertyMapper, ToOnePropertyMapper,
};

/// Audit mapping of one entity
#[derive(Debug, Clone)]
pub struct EntityConfiguration {
    pub entity_name: String,
    pub id_property: String,
    pub parent_entity_name: Option<String>,
    pub mapper: Arc<PropertyMapper>,
}

impl EntityConfiguration {
    pub fn mapper(&self) -> &PropertyMapper {
        &self.mapper
    }

    /// Snapshot names of the top-level audited properties
    pub fn property_names(&self) -> Vec<&str> {
        self.mapper.properties().into_iter().map(PropertyData::name).collect()
    }
}

/// Builds [`EntityConfiguration`]s from registered class descriptors
pub struct AuditMetadataBuilder<'r> {
    config: AuditConfig,
    registry: &'r ClassRegistry,
    entities: IndexMap<String, Arc<EntityConfiguration>>,
}

impl<'r> AuditMetadataBuilder<'r> {
    pub fn new(config: AuditConfig, registry: &'r ClassRegistry) -> Self {
        Self {
            config,
            registry,
            entities: IndexMap::new(),
        }
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Configure auditing for a registered entity class
    #[tracing::instrument(skip(self))]
    pub fn add_entity(&mut self, entity_name: &str) -> AuditResult<Arc<EntityConfiguration>> {
        let descriptor = self.registry.require(entity_name)?;
        let id_property = descriptor
            .id_property()
            .ok_or_else(|| AuditError::MissingIdentifier(entity_name.to_string()))?;

        let mapper = match descriptor.parent {
            Some(parent_name) => self.subclass_mapper(descriptor, parent_name)?,
            None => {
                let mut root = MultiPropertyMapper::new();
                for property in &descriptor.properties {
                    self.add_property(&mut root, descriptor.name, None, property)?;
                }
                PropertyMapper::Multi(root)
            }
        };

        let configuration = Arc::new(EntityConfiguration {
            entity_name: descriptor.name.to_string(),
            id_property: id_property.name.to_string(),
            parent_entity_name: descriptor.parent.map(str::to_string),
            mapper: Arc::new(mapper),
        });
        tracing::debug!(
            "Configured audit for {} ({} properties)",
            configuration.entity_name,
            configuration.mapper.properties().len()
        );

        self.entities
            .insert(configuration.entity_name.clone(), Arc::clone(&configuration));
        Ok(configuration)
    }

    fn subclass_mapper(
        &self,
        descriptor: &'static ClassDescriptor,
        parent_name: &str,
    ) -> AuditResult<PropertyMapper> {
        let parent = self
            .entities
            .get(parent_name)
            .ok_or_else(|| AuditError::UnauditedSuperclass {
                entity: descriptor.name.to_string(),
                parent: parent_name.to_string(),
            })?;
        let parent_descriptor = self.registry.require(parent_name)?;

        let mut main = MultiPropertyMapper::new();
        for property in &descriptor.properties {
            if parent_descriptor.property(property.name).is_none() {
                self.add_property(&mut main, descriptor.name, None, property)?;
            }
        }
        Ok(PropertyMapper::Subclass(SubclassPropertyMapper::new(
            main,
            Arc::clone(&parent.mapper),
        )))
    }

    /// `prefix` is the owning component's snapshot name and dotted path
    fn add_property(
        &self,
        target: &mut dyn CompositeMapperBuilder,
        entity_name: &str,
        prefix: Option<(&str, &str)>,
        property: &PropertyDescriptor,
    ) -> AuditResult<()> {
        if property.is_id() || !property.is_audited() {
            return Ok(());
        }

        let (name, path) = match prefix {
            Some((name, path)) => (
                format!("{name}_{}", property.name),
                format!("{path}.{}", property.name),
            ),
            None => (property.name.to_string(), property.name.to_string()),
        };

        let mut data = PropertyData::new(name.clone(), property.value_type.clone())
            .with_bean_name(property.name);
        if self.config.global_with_modified_flag {
            data = data.with_modified_flag(format!("{name}{}", self.config.modified_flag_suffix));
        }

        match &property.value_type {
            ValueType::Embedded(class) => {
                let component_descriptor = self.registry.require(class)?;
                let component = target.add_component(data, component_descriptor)?;
                let prefix = Some((name.as_str(), path.as_str()));
                for child in &component_descriptor.properties {
                    self.add_property(component, entity_name, prefix, child)?;
                }
            }
            ValueType::Reference(target_entity) => {
                let mapper = ToOnePropertyMapper::new(data.clone(), *target_entity);
                target.add_composite(data, PropertyMapper::ToOne(mapper))?;
            }
            ValueType::List(_) => {
                let role = format!("{entity_name}.{path}");
                let mapper = CollectionPropertyMapper::new(data.clone(), role);
                target.add_composite(data, PropertyMapper::Collection(mapper))?;
            }
            _ => {
                let mapper = SinglePropertyMapper::new(data.clone())
                    .with_empty_string_as_null(self.config.treat_empty_string_as_null);
                target.add_composite(data, PropertyMapper::Single(mapper))?;
            }
        }
        Ok(())
    }

    pub fn entity(&self, entity_name: &str) -> AuditResult<Arc<EntityConfiguration>> {
        self.entities
            .get(entity_name)
            .cloned()
            .ok_or_else(|| AuditError::UnknownEntity(entity_name.to_string()))
    }

    pub fn is_audited(&self, entity_name: &str) -> bool {
        self.entities.contains_key(entity_name)
    }

    /// Audited entity names in registration order
    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Address, Company, Contractor, Employee, Person};
    use palimpsest_model::{Record, Snapshot, Value};

    fn registry() -> ClassRegistry {
        let registry = ClassRegistry::new();
        registry.register_class::<Address>();
        registry.register_class::<Person>();
        registry.register_class::<Employee>();
        registry.register_class::<Company>();
        registry.register_class::<Contractor>();
        registry
    }

    #[test]
    fn test_entity_tree_layout() {
        let registry = registry();
        let mut builder = AuditMetadataBuilder::new(AuditConfig::default(), &registry);
        let person = builder.add_entity("Person").unwrap();

        assert_eq!(person.id_property, "id");
        assert_eq!(
            person.property_names(),
            vec!["name", "age", "nickname", "address", "employer", "tags"]
        );

        let PropertyMapper::Multi(root) = person.mapper() else {
            panic!("entity root must be a multi mapper");
        };
        assert!(matches!(root.get("employer"), Some(PropertyMapper::ToOne(_))));
        match root.get("tags") {
            Some(PropertyMapper::Collection(tags)) => assert_eq!(tags.role(), "Person.tags"),
            other => panic!("unexpected mapper {other:?}"),
        }
        match root.get("address") {
            Some(PropertyMapper::Component(address)) => {
                let children: Vec<_> = address
                    .delegate()
                    .entries()
                    .map(|(p, _)| (p.name().to_string(), p.bean_name().to_string()))
                    .collect();
                assert_eq!(children[0], ("address_street".to_string(), "street".to_string()));
                assert_eq!(children.len(), 3);
            }
            other => panic!("unexpected mapper {other:?}"),
        }
    }

    #[test]
    fn test_global_modified_flags() {
        let registry = registry();
        let config = AuditConfig {
            global_with_modified_flag: true,
            ..Default::default()
        };
        let mut builder = AuditMetadataBuilder::new(config, &registry);
        let person = builder.add_entity("Person").unwrap();
        assert!(person.mapper().has_properties_with_modified_flag());

        let mut data = Snapshot::new();
        let new = Value::Record(Record::new("Person").with("name", "Ada"));
        person.mapper().map_to_map_from_entity(&mut data, &new, &Value::Null);
        assert_eq!(data.get("name_MOD"), Some(&Value::Bool(true)));
        assert_eq!(data.get("age_MOD"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_subclass_shares_parent_tree() {
        let registry = registry();
        let mut builder = AuditMetadataBuilder::new(AuditConfig::default(), &registry);
        let person = builder.add_entity("Person").unwrap();
        let employee = builder.add_entity("Employee").unwrap();

        assert_eq!(employee.parent_entity_name.as_deref(), Some("Person"));
        let PropertyMapper::Subclass(subclass) = employee.mapper() else {
            panic!("subclass entity must use a subclass mapper");
        };
        assert!(Arc::ptr_eq(subclass.parent(), &person.mapper));
        assert_eq!(subclass.main().len(), 2);
        assert!(subclass.main().contains("salary"));
        assert!(subclass.main().contains("skills"));
    }

    #[test]
    fn test_unaudited_superclass_is_rejected() {
        let registry = registry();
        let mut builder = AuditMetadataBuilder::new(AuditConfig::default(), &registry);
        let err = builder.add_entity("Contractor").unwrap_err();
        assert!(matches!(
            err,
            AuditError::UnauditedSuperclass { ref parent, .. } if parent == "Vendor"
        ));
        assert!(!builder.is_audited("Contractor"));
    }

    #[test]
    fn test_unknown_entity() {
        let registry = registry();
        let mut builder = AuditMetadataBuilder::new(AuditConfig::default(), &registry);
        assert!(matches!(builder.add_entity("Invoice"), Err(AuditError::Bytecode(_))));
        assert!(matches!(builder.entity("Person"), Err(AuditError::UnknownEntity(_))));
    }

    #[test]
    fn test_component_without_identifier_is_not_an_entity() {
        let registry = registry();
        let mut builder = AuditMetadataBuilder::new(AuditConfig::default(), &registry);
        assert!(matches!(
            builder.add_entity("Address"),
            Err(AuditError::MissingIdentifier(_))
        ));
    }
}
