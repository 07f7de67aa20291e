//! Error types for mapping and audit bootstrap

use palimpsest_bytecode::{AccessError, BytecodeError};

/// Errors raised while building or running a property mapper tree
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MappingError {
    /// Name already registered in the same composite namespace
    #[error("Property {0} is already mapped")]
    DuplicateProperty(String),

    /// Snapshot entry has a shape the mapper cannot read
    #[error("Unexpected value for {property}: expected {expected}, found {found}")]
    UnexpectedValue {
        property: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Component class could not be instantiated
    #[error("Cannot instantiate {class} for {property}: {source}")]
    Instantiation {
        class: String,
        property: String,
        #[source]
        source: BytecodeError,
    },

    /// Reading or writing a property on the target failed
    #[error("Cannot access {property}: {source}")]
    Access {
        property: String,
        #[source]
        source: AccessError,
    },

    /// History reader failure
    #[error("History lookup failed: {0}")]
    History(String),
}

impl MappingError {
    pub(crate) fn access(property: &str, source: AccessError) -> Self {
        Self::Access {
            property: property.to_string(),
            source,
        }
    }
}

/// Errors raised while building audit configuration or writing audit rows
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// An audited entity extends an entity that is not audited
    #[error("Entity {entity} is audited but its superclass {parent} is not")]
    UnauditedSuperclass { entity: String, parent: String },

    /// No configuration for the entity name
    #[error("Unknown audited entity: {0}")]
    UnknownEntity(String),

    /// Entity has no identifier property
    #[error("Entity {0} has no identifier property")]
    MissingIdentifier(String),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Bytecode(#[from] BytecodeError),

    #[error("Failed to serialize audit row: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for audit operations
pub type AuditResult<T> = Result<T, AuditError>;
