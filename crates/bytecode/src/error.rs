//! Error types for class metadata, reflection and lazy loading

use palimpsest_model::{EntityId, ValueError};

/// Error reading or writing a property through its accessor table
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AccessError {
    /// No property with this name on the class
    #[error("Unknown property: {class}.{property}")]
    UnknownProperty { class: String, property: String },

    /// The value could not be converted to the field type
    #[error("Cannot assign {class}.{property}: {source}")]
    TypeMismatch {
        class: String,
        property: String,
        #[source]
        source: ValueError,
    },

    /// Accessor invoked on an instance of another class
    #[error("Accessor of {expected} invoked on an instance of {found}")]
    WrongTarget { expected: String, found: String },
}

impl AccessError {
    pub fn unknown(class: &str, property: &str) -> Self {
        AccessError::UnknownProperty {
            class: class.to_string(),
            property: property.to_string(),
        }
    }

    pub fn mismatch(class: &str, property: &str, source: ValueError) -> Self {
        AccessError::TypeMismatch {
            class: class.to_string(),
            property: property.to_string(),
            source,
        }
    }
}

/// Error building or using reflection optimizers and proxies
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BytecodeError {
    /// Getter, setter and type lists differ in length
    #[error("Bad number of accessors: {getters} getters, {setters} setters, {types} types")]
    BadAccessorCount {
        getters: usize,
        setters: usize,
        types: usize,
    },

    /// Accessor name does not resolve to a property of the class
    #[error("No accessor {accessor} on {class}")]
    UnknownAccessor { class: String, accessor: String },

    /// Getter and setter at one position address different properties
    #[error("Accessors {getter} and {setter} of {class} address different properties")]
    MismatchedAccessors {
        class: String,
        getter: String,
        setter: String,
    },

    /// Declared type does not match the property type
    #[error("Wrong type for {class}.{accessor}: declared {declared}, actual {actual}")]
    WrongType {
        class: String,
        accessor: String,
        declared: String,
        actual: String,
    },

    /// The class has no no-argument constructor
    #[error("Class {0} cannot be instantiated: no default constructor")]
    NotInstantiable(String),

    /// Value array length differs from the accessor list
    #[error("Expected {expected} property values, got {actual}")]
    ValueCount { expected: usize, actual: usize },

    /// Class was never registered with the provider
    #[error("Class not registered: {0}")]
    UnknownClass(String),

    #[error(transparent)]
    Access(#[from] AccessError),
}

/// Error reported by a session while fetching state
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct FetchError(pub String);

/// Failure to initialize lazy state at the point of access
///
/// Every variant carries the entity name and identifier for diagnosis.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LazyInitializationError {
    #[error("Could not initialize {entity_name}#{id} - no session")]
    NoSession { entity_name: String, id: EntityId },

    #[error("Could not initialize {entity_name}#{id} - the owning session was closed")]
    SessionClosed { entity_name: String, id: EntityId },

    #[error("Could not initialize {entity_name}#{id} - session is disconnected")]
    Disconnected { entity_name: String, id: EntityId },

    #[error("No row with the given identifier exists: {entity_name}#{id}")]
    EntityNotFound { entity_name: String, id: EntityId },

    #[error("Fetching {entity_name}#{id} failed: {source}")]
    Fetch {
        entity_name: String,
        id: EntityId,
        #[source]
        source: FetchError,
    },

    #[error("Could not initialize {entity_name}#{id}: {source}")]
    Bytecode {
        entity_name: String,
        id: EntityId,
        #[source]
        source: BytecodeError,
    },
}

/// Error using enhancement metadata or the instance side-table
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EnhancementError {
    /// Enhancement-only operation on a class that is not enhanced
    #[error("Entity [{0}] is not enhanced and therefore not instrumented")]
    NotInstrumented(String),

    /// The instance handle is stale or never existed
    #[error("Unknown entity instance")]
    UnknownInstance,

    /// Metadata of one entity type applied to an instance of another
    #[error("Metadata for {expected} applied to an instance of {found}")]
    WrongEntityType { expected: String, found: String },

    /// Enhancement-as-proxy was switched off for the entity type
    #[error("Enhancement-as-proxy is disabled for {0}")]
    ProxyDisabled(String),

    #[error(transparent)]
    LazyInitialization(#[from] LazyInitializationError),

    #[error(transparent)]
    Bytecode(#[from] BytecodeError),

    #[error(transparent)]
    Access(#[from] AccessError),
}
