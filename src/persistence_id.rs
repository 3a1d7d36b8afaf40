//! Stable identity partitioning every store.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a persistent entity: entity type plus entity key.
///
/// Rendered as `"<entity_type>-<entity_id>"` wherever it is used as a
/// storage key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PersistenceId {
    entity_type: String,
    entity_id: String,
}

impl PersistenceId {
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }
}

impl fmt::Display for PersistenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.entity_type, self.entity_id)
    }
}
