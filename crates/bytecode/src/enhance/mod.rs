//! Bytecode enhancement: lazy-attribute interception per instance
//!
//! # Lifecycle
//!
//! ```text
//!  NotEnhanced                 (class has no enhancement; no interceptor)
//!
//!  instantiate(eager=false) ──► Uninitialized ──(last lazy fetch)──► Initialized
//!  instantiate(eager=true)  ──────────────────────────────────────► Initialized
//!
//!  inject_enhanced_entity_as_proxy_interceptor ──► DetachedProxy
//!        DetachedProxy ──(non-identifier access, full load)──► Uninitialized
//! ```
//!
//! Fetches happen at the point of access and go through a
//! [`SessionContext`](crate::session::SessionContext). A failed fetch
//! surfaces as a [`LazyInitializationError`](crate::error::LazyInitializationError)
//! and leaves the state as it was.

mod instances;
mod interceptor;
mod legacy;
mod metadata;

pub use instances::{EntityInstances, InstanceKey};
pub use interceptor::{
    EnhancementAsProxyInterceptor, LazyAttributeLoadingInterceptor, PersistentAttributeInterceptor,
};
pub use legacy::{EntityInstrumentationMetadata, FieldInterceptor, InstrumentationAdapter};
pub use metadata::{BytecodeEnhancementMetadata, EnhancementSettings};

/// Lazy-loading state of one instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LazinessState {
    /// The class is not enhanced
    NotEnhanced,
    /// Some lazy attributes are unfetched
    Uninitialized,
    /// Every tracked lazy attribute is fetched
    Initialized,
    /// Stands in for a known key; nothing loaded
    DetachedProxy,
}
