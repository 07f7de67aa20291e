//! Audit history access used while materializing

use palimpsest_model::{EntityId, Revision, Value};

use crate::error::MappingError;

/// Read access to audit history at a revision
pub trait HistoryReader {
    /// Resolve a to-one reference to `entity_name#id` as of `revision`
    ///
    /// Returns `Value::Null` when the target did not exist at that revision.
    fn resolve_reference(
        &self,
        entity_name: &str,
        id: &Value,
        revision: Revision,
    ) -> Result<Value, MappingError>;

    /// Collection contents of `role` owned by `owner_id` as of `revision`
    fn read_collection(
        &self,
        role: &str,
        owner_id: &EntityId,
        revision: Revision,
    ) -> Result<Value, MappingError>;
}

/// Everything a mapper needs besides the snapshot
#[derive(Clone, Copy)]
pub struct MaterializeContext<'a> {
    pub primary_key: &'a EntityId,
    pub reader: &'a dyn HistoryReader,
    pub revision: Revision,
}

impl<'a> MaterializeContext<'a> {
    pub fn new(primary_key: &'a EntityId, reader: &'a dyn HistoryReader, revision: Revision) -> Self {
        Self {
            primary_key,
            reader,
            revision,
        }
    }
}

/// Reader for snapshots materialized without history
///
/// References resolve to null and collections to empty lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHistory;

impl HistoryReader for NoHistory {
    fn resolve_reference(
        &self,
        _entity_name: &str,
        _id: &Value,
        _revision: Revision,
    ) -> Result<Value, MappingError> {
        Ok(Value::Null)
    }

    fn read_collection(
        &self,
        _role: &str,
        _owner_id: &EntityId,
        _revision: Revision,
    ) -> Result<Value, MappingError> {
        Ok(Value::List(Vec::new()))
    }
}
