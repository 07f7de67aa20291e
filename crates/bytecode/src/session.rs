//! Session contract consumed by lazy loading and proxies
//!
//! The session itself (persistence context, connection, loaders) lives
//! outside this crate. Lazy state is only ever fetched through this trait.

use palimpsest_model::{EntityId, SessionId, Snapshot, Value};

use crate::error::{FetchError, LazyInitializationError};

/// An open unit of work able to fetch entity state
pub trait SessionContext {
    fn id(&self) -> SessionId;

    fn is_open(&self) -> bool;

    /// Whether the session currently holds a connection
    fn is_connected(&self) -> bool;

    /// Load the full (non-lazy) state of an entity
    ///
    /// `Ok(None)` means no row exists for the identifier.
    fn load_entity(&self, entity_name: &str, id: &EntityId)
        -> Result<Option<Snapshot>, FetchError>;

    /// Load one lazy attribute of an entity
    fn load_lazy_attribute(
        &self,
        entity_name: &str,
        id: &EntityId,
        attribute: &str,
    ) -> Result<Value, FetchError>;
}

/// Check that `session` may be used to fetch state owned by `owner`
///
/// Requires an associated, open and connected session. The supplied session
/// must be the associated one unless loading outside the owning transaction
/// is allowed, in which case any open, connected session will do.
pub fn check_session(
    entity_name: &str,
    id: &EntityId,
    owner: Option<SessionId>,
    session: &dyn SessionContext,
    allow_load_outside_transaction: bool,
) -> Result<(), LazyInitializationError> {
    let no_session = || LazyInitializationError::NoSession {
        entity_name: entity_name.to_string(),
        id: id.clone(),
    };

    match owner {
        None if !allow_load_outside_transaction => return Err(no_session()),
        Some(owner) if owner != session.id() && !allow_load_outside_transaction => {
            return Err(no_session())
        }
        _ => {}
    }

    if !session.is_open() {
        return Err(LazyInitializationError::SessionClosed {
            entity_name: entity_name.to_string(),
            id: id.clone(),
        });
    }
    if !session.is_connected() {
        return Err(LazyInitializationError::Disconnected {
            entity_name: entity_name.to_string(),
            id: id.clone(),
        });
    }
    Ok(())
}

/// Load full entity state, mapping a missing row and fetch failures
pub fn load_entity_state(
    session: &dyn SessionContext,
    entity_name: &str,
    id: &EntityId,
) -> Result<Snapshot, LazyInitializationError> {
    match session.load_entity(entity_name, id) {
        Ok(Some(state)) => Ok(state),
        Ok(None) => Err(LazyInitializationError::EntityNotFound {
            entity_name: entity_name.to_string(),
            id: id.clone(),
        }),
        Err(source) => Err(LazyInitializationError::Fetch {
            entity_name: entity_name.to_string(),
            id: id.clone(),
            source,
        }),
    }
}
