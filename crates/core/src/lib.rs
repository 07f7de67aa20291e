//! Palimpsest - Audit Property Mapping and Lazy Loading
//!
//! This crate ties the workspace together: mapper trees that diff object
//! states into audit snapshots and materialize them back, the audit
//! bootstrap that builds those trees from class descriptors, and the
//! configuration and logging setup.
//!
//! # Re-exports
//!
//! This crate re-exports the model and bytecode crates for convenience:
//! - [`model`] - Property values, snapshots and identities
//! - [`bytecode`] - Class descriptors, enhancement, proxies and reflection
//!
//! # Example
//!
//! ```ignore
//! use palimpsest_core::{AuditMetadataBuilder, BytecodeProvider, OrmConfig, Persistent};
//!
//! let config = OrmConfig::load()?;
//! palimpsest_core::logging::init(&config);
//!
//! let provider = BytecodeProvider::new();
//! provider.register::<Person>();
//!
//! let mut audit = AuditMetadataBuilder::new(config.audit.clone(), provider.registry());
//! let person = audit.add_entity("Person")?;
//!
//! let mut data = Snapshot::new();
//! let changed = person.mapper().map_instances(&mut data, Some(&new), Some(&old));
//! ```

pub use palimpsest_bytecode as bytecode;
pub use palimpsest_model as model;

pub mod audit;
pub mod config;
pub mod error;
pub mod logging;
pub mod mapper;

#[cfg(test)]
mod fixtures;

// Derive macro and the trait it implements share a name
pub use palimpsest_bytecode::Persistent;
pub use palimpsest_macros::Persistent;

pub use audit::{
    AuditMetadataBuilder, AuditRow, AuditTransaction, AuditWorkUnit, EntityConfiguration,
    InMemoryHistory, RevisionType,
};
pub use config::{AuditConfig, ConfigError, ConfigResult, EnhancementConfig, OrmConfig};
pub use error::{AuditError, AuditResult, MappingError};
pub use mapper::{
    CollectionChange, CompositeMapperBuilder, ExtendedPropertyMapper, HistoryReader,
    MaterializeContext, MultiPropertyMapper, NoHistory, PropertyMapper,
};

pub use palimpsest_bytecode::{
    BytecodeEnhancementMetadata, BytecodeProvider, EnhancementSettings, EntityInstances,
    PersistentClass, PropertyAccess, SessionContext,
};
pub use palimpsest_model::{EntityId, EntityKey, PropertyData, Record, Revision, Snapshot, Value, ValueType};
