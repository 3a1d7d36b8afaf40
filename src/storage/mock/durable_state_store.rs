//! Mock DurableStateStore implementation for testing.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::envelope::DurableStateEnvelope;
use crate::persistence_id::PersistenceId;
use crate::storage::helpers;
use crate::storage::{DurableStateStore, Result, StorageError};

/// Mock durable state store that stores state in memory.
pub struct MockDurableStateStore<P> {
    states: RwLock<HashMap<PersistenceId, DurableStateEnvelope<P>>>,
}

impl<P> Default for MockDurableStateStore<P> {
    fn default() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
        }
    }
}

impl<P> MockDurableStateStore<P> {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl<P: Clone + Send + Sync + 'static> DurableStateStore<P> for MockDurableStateStore<P> {
    async fn get(&self, id: &PersistenceId) -> Result<Option<DurableStateEnvelope<P>>> {
        Ok(self.states.read().await.get(id).cloned())
    }

    async fn upsert(&self, id: &PersistenceId, state: &DurableStateEnvelope<P>) -> Result<()> {
        helpers::validate_version(id, state.version)?;

        let mut states = self.states.write().await;
        match states.get(id) {
            Some(current) if current.version != state.version - 1 => {
                Err(StorageError::conflict(id, state.version - 1))
            }
            _ => {
                states.insert(id.clone(), state.clone());
                Ok(())
            }
        }
    }

    async fn delete(&self, id: &PersistenceId) -> Result<()> {
        self.states.write().await.remove(id);
        Ok(())
    }
}
