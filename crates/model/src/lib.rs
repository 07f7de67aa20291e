//! Palimpsest Model - Property Value Type Definitions
//!
//! This crate contains the value types shared by the mapping engine and the
//! bytecode layer. It only depends on serde/indexmap so it compiles quickly,
//! allowing parallel compilation of dependent crates.
//!
//! # Modules
//!
//! - [`value`] - Dynamically typed property values and audit snapshots
//! - [`convert`] - Conversions between Rust field types and [`Value`]
//! - [`property`] - Attribute identities used to register property mappers
//! - [`identity`] - Entity identifiers, keys, revisions and session ids

pub mod convert;
pub mod identity;
pub mod property;
pub mod value;

pub use convert::{FromValue, IntoValue, ValueError, ValueKind};
pub use identity::{EntityId, EntityKey, Revision, SessionId};
pub use property::{AccessType, PropertyData};
pub use value::{Record, Snapshot, Value, ValueType};
