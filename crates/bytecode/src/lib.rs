//! Palimpsest Bytecode - Class Metadata, Reflection and Lazy Loading
//!
//! This crate provides the runtime class layer the mapping engine builds on:
//!
//! - [`descriptor`] - Per-class accessor tables generated by `#[derive(Persistent)]`
//! - [`reflection`] - Positional bulk property access and instantiation
//! - [`proxy`] - Lazy entity proxies and pass-through value proxies
//! - [`provider`] - The bytecode provider owning registry, caches and proxy factories
//! - [`enhance`] - Enhancement metadata, interceptors and the instance side-table
//! - [`session`] - The session contract lazy state is fetched through
//!
//! # Example
//!
//! ```ignore
//! use palimpsest_core::{BytecodeProvider, Persistent, ValueType};
//!
//! #[derive(Debug, Default, Persistent)]
//! #[persistent(entity = "Person", enhanced)]
//! pub struct Person {
//!     #[persistent(id)]
//!     id: i64,
//!     name: String,
//!     #[persistent(lazy)]
//!     biography: Option<String>,
//! }
//!
//! let provider = BytecodeProvider::new();
//! let descriptor = provider.register::<Person>();
//! let optimizer = provider.reflection_optimizer(
//!     descriptor,
//!     &["id", "name"],
//!     &["set_id", "set_name"],
//!     &[ValueType::Integer, ValueType::Text],
//! )?;
//! ```

// Allow the crate to refer to itself as `palimpsest_bytecode` for proc macro compatibility
extern crate self as palimpsest_bytecode;

pub use palimpsest_model as model;

pub mod descriptor;
pub mod enhance;
pub mod error;
pub mod hash;
pub mod provider;
pub mod proxy;
pub mod reflection;
pub mod registry;
pub mod session;

#[cfg(test)]
mod fixtures;

pub use descriptor::{
    apply_state, embedded, ClassDescriptor, Persistent, PersistentClass, PropertyAccess,
    PropertyDescriptor, PropertyFlags,
};
pub use enhance::{
    BytecodeEnhancementMetadata, EnhancementSettings, EntityInstances, EntityInstrumentationMetadata,
    InstanceKey, LazinessState, PersistentAttributeInterceptor,
};
pub use error::{AccessError, BytecodeError, EnhancementError, FetchError, LazyInitializationError};
pub use provider::BytecodeProvider;
pub use proxy::{BasicProxy, BasicProxyFactory, EntityProxy, ProxyFactory, ProxyFactoryFactory};
pub use reflection::{AccessOptimizer, InstantiationOptimizer, ReflectionOptimizer};
pub use registry::ClassRegistry;
pub use session::SessionContext;
