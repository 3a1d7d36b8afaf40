//! Mock SnapshotStore implementation for testing.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::envelope::SnapshotEnvelope;
use crate::persistence_id::PersistenceId;
use crate::storage::{Result, SnapshotStore, StorageError};

/// Mock snapshot store that stores snapshots in memory.
pub struct MockSnapshotStore<P> {
    snapshots: RwLock<HashMap<PersistenceId, BTreeMap<i64, SnapshotEnvelope<P>>>>,
}

impl<P> Default for MockSnapshotStore<P> {
    fn default() -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
        }
    }
}

impl<P> MockSnapshotStore<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of snapshots kept for an identity.
    pub async fn stored_count(&self, id: &PersistenceId) -> usize {
        self.snapshots
            .read()
            .await
            .get(id)
            .map(BTreeMap::len)
            .unwrap_or_default()
    }
}

#[async_trait]
impl<P: Clone + Send + Sync + 'static> SnapshotStore<P> for MockSnapshotStore<P> {
    async fn save(&self, id: &PersistenceId, snapshot: &SnapshotEnvelope<P>) -> Result<()> {
        let mut store = self.snapshots.write().await;
        let snapshots = store.entry(id.clone()).or_default();

        if snapshots.contains_key(&snapshot.sequence_nr) {
            return Err(StorageError::DuplicateSnapshot {
                persistence_id: id.clone(),
                sequence_nr: snapshot.sequence_nr,
            });
        }

        snapshots.insert(snapshot.sequence_nr, snapshot.clone());
        Ok(())
    }

    async fn load(&self, id: &PersistenceId) -> Result<Option<SnapshotEnvelope<P>>> {
        let store = self.snapshots.read().await;
        Ok(store
            .get(id)
            .and_then(|snapshots| snapshots.values().next_back().cloned()))
    }

    async fn delete(&self, id: &PersistenceId, max_sequence_nr: i64) -> Result<()> {
        if let Some(snapshots) = self.snapshots.write().await.get_mut(id) {
            snapshots.retain(|seq, _| *seq > max_sequence_nr);
        }
        Ok(())
    }
}
