//! Attribute parsing for the Persistent derive macro

use darling::{FromDeriveInput, FromField};
use syn::{DeriveInput, GenericArgument, Generics, Ident, PathArguments, Type};

/// Parsed #[persistent(...)] attributes on the struct
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(persistent), supports(struct_named))]
pub struct PersistentArgs {
    /// Struct identifier
    pub ident: Ident,

    /// Struct generics (must be empty)
    pub generics: Generics,

    /// Struct fields
    pub data: darling::ast::Data<(), PersistentFieldArgs>,

    /// Entity name (defaults to the struct name)
    #[darling(default)]
    pub entity: Option<String>,

    /// Whether instances support lazy-attribute interception
    #[darling(default)]
    pub enhanced: bool,

    /// Entity name of the mapped superclass
    #[darling(default)]
    pub extends: Option<String>,

    /// The struct has no `Default` impl, so no constructor is generated
    #[darling(default)]
    pub no_default: bool,
}

impl PersistentArgs {
    pub fn class_name(&self) -> String {
        self.entity
            .clone()
            .unwrap_or_else(|| self.ident.to_string())
    }
}

/// Parsed #[persistent(...)] attributes on a field
#[derive(Debug, FromField)]
#[darling(attributes(persistent))]
pub struct PersistentFieldArgs {
    /// Field identifier
    pub ident: Option<Ident>,

    /// Field type
    pub ty: Type,

    /// Entity identifier
    #[darling(default)]
    pub id: bool,

    /// Fetched on first access
    #[darling(default)]
    pub lazy: bool,

    /// Embedded component (field type must be `Option<T>`)
    #[darling(default)]
    pub embedded: bool,

    /// To-one association targeting the named entity
    #[darling(default)]
    pub reference: Option<String>,

    /// Not a mapped property
    #[darling(default)]
    pub skip: bool,

    /// Mapped but excluded from auditing
    #[darling(default)]
    pub not_audited: bool,

    /// Property name override
    #[darling(default)]
    pub name: Option<String>,
}

impl PersistentFieldArgs {
    /// Field name with a leading underscore stripped
    pub fn clean_name(&self) -> String {
        let raw = self
            .ident
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        raw.strip_prefix('_').unwrap_or(&raw).to_string()
    }

    /// Mapped property name
    pub fn property_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.clean_name())
    }
}

/// Extract the inner type from `Option<T>`
pub fn option_inner_type(ty: &Type) -> Option<&Type> {
    if let Type::Path(type_path) = ty {
        if let Some(segment) = type_path.path.segments.last() {
            if segment.ident == "Option" {
                if let PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(GenericArgument::Type(inner)) = args.args.first() {
                        return Some(inner);
                    }
                }
            }
        }
    }
    None
}

/// Parse a DeriveInput into PersistentArgs
pub fn parse_persistent(input: &DeriveInput) -> darling::Result<PersistentArgs> {
    PersistentArgs::from_derive_input(input)
}
