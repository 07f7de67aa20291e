//! Audit bootstrap, work units and history
//!
//! - [`builder`] - Turns class descriptors into mapper trees
//! - [`work`] - Per-transaction audit work and the rows it produces
//! - [`history`] - In-memory audit history and point-in-time reads

pub mod builder;
pub mod history;
pub mod work;

use serde::{Deserialize, Serialize};

pub use builder::{AuditMetadataBuilder, EntityConfiguration};
pub use history::InMemoryHistory;
pub use work::{AuditRow, AuditTransaction, AuditWorkUnit, EntityWork};

/// Kind of change recorded by an audit row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RevisionType {
    Add,
    Mod,
    Del,
}
