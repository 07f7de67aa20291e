//! Palimpsest Proc Macros
//!
//! This crate provides `#[derive(Persistent)]`, which turns a plain struct
//! into a persistent class: it generates the class's accessor dispatch table
//! (`ClassDescriptor`) and implements `PropertyAccess`, `Persistent` and
//! `PersistentClass` for it.
//!
//! # Example
//!
//! ```ignore
//! use palimpsest_core::Persistent;
//!
//! #[derive(Debug, Default, Persistent)]
//! #[persistent(entity = "Person", enhanced)]
//! pub struct Person {
//!     #[persistent(id)]
//!     id: i64,
//!
//!     name: String,
//!
//!     #[persistent(lazy)]
//!     biography: Option<String>,
//!
//!     #[persistent(embedded)]
//!     address: Option<Address>,
//!
//!     #[persistent(reference = "Company")]
//!     employer: Option<EntityKey>,
//! }
//!
//! // Generated:
//! // - Person::ID_PROPERTY, Person::NAME_PROPERTY, ... constants
//! // - <Person as PersistentClass>::class_descriptor() with getters `id`,
//! //   `name`, ... and setters `set_id`, `set_name`, ...
//! // - person.get_property("name") / person.set_property("name", value)
//! ```
//!
//! # Attributes
//!
//! ## Struct Attributes
//!
//! - `#[persistent(entity = "Name")]` - Entity name (default: the struct name).
//! - `#[persistent(enhanced)]` - Instances support lazy-attribute interception.
//! - `#[persistent(extends = "Parent")]` - Entity name of the mapped superclass.
//! - `#[persistent(no_default)]` - No `Default` impl; the class is not instantiable.
//!
//! ## Field Attributes
//!
//! - `#[persistent(id)]` - Entity identifier.
//! - `#[persistent(lazy)]` - Fetched on first access (enhanced classes only).
//! - `#[persistent(embedded)]` - Embedded component; field type must be `Option<T>`
//!   where `T` is itself `Persistent`.
//! - `#[persistent(reference = "Entity")]` - To-one association by `EntityKey`.
//! - `#[persistent(not_audited)]` - Mapped, but excluded from auditing.
//! - `#[persistent(name = "...")]` - Property name override.
//! - `#[persistent(skip)]` - Not mapped at all.

mod parse;
mod persistent;

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

/// Derive macro for persistent classes
///
/// Every mapped field type must implement `IntoValue`, `FromValue` and
/// `ValueKind`; embedded fields instead need `Option<T>` with `T: Persistent
/// + Default`.
///
/// # Generated Code
///
/// - One getter and one setter function per property, stored as function
///   pointers in the class descriptor
/// - A `OnceLock` static holding the descriptor, built on first use
/// - `PersistentClass`, `Persistent` and `PropertyAccess` implementations
/// - `{FIELD}_PROPERTY` name constants
#[proc_macro_derive(Persistent, attributes(persistent))]
pub fn derive_persistent(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    persistent::derive_persistent(input).into()
}
