//! Mapped attribute identities

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::value::ValueType;

/// How a property is read and written on the owning object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AccessType {
    /// Direct field access
    #[default]
    Field,
    /// Through getter/setter accessors
    Property,
}

/// Identity of one mapped attribute
///
/// `name` is the key used in audit snapshots; `bean_name` is the accessor
/// name on the owning object. They differ for component children, whose
/// snapshot keys are prefixed with the component name.
///
/// Two `PropertyData` are equal when their names are equal.
#[derive(Debug, Clone)]
pub struct PropertyData {
    name: String,
    bean_name: String,
    access_type: AccessType,
    value_type: ValueType,
    modified_flag_name: Option<String>,
    synthetic: bool,
}

impl PropertyData {
    /// Create property data whose bean name equals its name
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        let name = name.into();
        Self {
            bean_name: name.clone(),
            name,
            access_type: AccessType::Field,
            value_type,
            modified_flag_name: None,
            synthetic: false,
        }
    }

    /// Override the accessor name
    pub fn with_bean_name(mut self, bean_name: impl Into<String>) -> Self {
        self.bean_name = bean_name.into();
        self
    }

    pub fn with_access_type(mut self, access_type: AccessType) -> Self {
        self.access_type = access_type;
        self
    }

    /// Track changes of this property in a separate boolean column
    pub fn with_modified_flag(mut self, flag_name: impl Into<String>) -> Self {
        self.modified_flag_name = Some(flag_name.into());
        self
    }

    /// Mark as synthetic: written to snapshots, never set on objects
    pub fn synthetic(mut self) -> Self {
        self.synthetic = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bean_name(&self) -> &str {
        &self.bean_name
    }

    pub fn access_type(&self) -> AccessType {
        self.access_type
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn is_using_modified_flag(&self) -> bool {
        self.modified_flag_name.is_some()
    }

    pub fn modified_flag_name(&self) -> Option<&str> {
        self.modified_flag_name.as_deref()
    }

    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }
}

impl PartialEq for PropertyData {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for PropertyData {}

impl Hash for PropertyData {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for PropertyData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name == self.bean_name {
            write!(f, "{} ({})", self.name, self.value_type)
        } else {
            write!(f, "{} -> {} ({})", self.name, self.bean_name, self.value_type)
        }
    }
}
