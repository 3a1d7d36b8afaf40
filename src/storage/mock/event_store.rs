//! Mock EventStore implementation for testing.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::envelope::EventEnvelope;
use crate::persistence_id::PersistenceId;
use crate::storage::helpers;
use crate::storage::{EventStore, EventStream, Result, StorageError};

type Journal<P> = HashMap<PersistenceId, BTreeMap<i64, EventEnvelope<P>>>;

/// Mock event store that stores events in memory.
///
/// Follows the same rejection rules as the SQL journal: a batch is written
/// whole or not at all, and a conflict reports the lowest offending sequence
/// number.
pub struct MockEventStore<P> {
    events: Arc<RwLock<Journal<P>>>,
    fail_on_persist: RwLock<bool>,
}

impl<P> Default for MockEventStore<P> {
    fn default() -> Self {
        Self {
            events: Arc::new(RwLock::new(HashMap::new())),
            fail_on_persist: RwLock::new(false),
        }
    }
}

impl<P> MockEventStore<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `persist` fail with a database error.
    pub async fn set_fail_on_persist(&self, fail: bool) {
        *self.fail_on_persist.write().await = fail;
    }

    pub async fn stored_count(&self, id: &PersistenceId) -> usize {
        self.events
            .read()
            .await
            .get(id)
            .map(BTreeMap::len)
            .unwrap_or_default()
    }
}

#[async_trait]
impl<P: Clone + Send + Sync + 'static> EventStore<P> for MockEventStore<P> {
    async fn persist(&self, id: &PersistenceId, events: &[EventEnvelope<P>]) -> Result<()> {
        if *self.fail_on_persist.read().await {
            return Err(StorageError::Database(sqlx::Error::PoolTimedOut));
        }
        if events.is_empty() {
            return Ok(());
        }
        helpers::validate_sequences(id, events)?;

        let mut store = self.events.write().await;
        let journal = store.entry(id.clone()).or_default();

        let sequences: Vec<i64> = events.iter().map(|e| e.sequence_nr).collect();
        let stored = sequences
            .iter()
            .copied()
            .filter(|seq| journal.contains_key(seq))
            .min();
        let conflict = [stored, helpers::lowest_batch_duplicate(&sequences)]
            .into_iter()
            .flatten()
            .min();

        if let Some(sequence_nr) = conflict {
            return Err(StorageError::conflict(id, sequence_nr));
        }

        for event in events {
            journal.insert(event.sequence_nr, event.clone());
        }
        Ok(())
    }

    fn load(
        &self,
        id: &PersistenceId,
        from_sequence_nr: i64,
        to_sequence_nr: i64,
    ) -> EventStream<P> {
        let events = Arc::clone(&self.events);
        let id = id.clone();

        Box::pin(async_stream::stream! {
            let selected: Vec<EventEnvelope<P>> = {
                let store = events.read().await;
                store
                    .get(&id)
                    .map(|journal| {
                        journal
                            .values()
                            .filter(|e| {
                                e.sequence_nr >= from_sequence_nr && e.sequence_nr <= to_sequence_nr
                            })
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default()
            };

            for event in selected {
                yield Ok::<_, StorageError>(event);
            }
        })
    }

    async fn delete_up_to(&self, id: &PersistenceId, to_sequence_nr: i64) -> Result<()> {
        if let Some(journal) = self.events.write().await.get_mut(id) {
            journal.retain(|seq, _| *seq > to_sequence_nr);
        }
        Ok(())
    }

    async fn highest_sequence_nr(&self, id: &PersistenceId) -> Result<i64> {
        let store = self.events.read().await;
        Ok(store
            .get(id)
            .and_then(|journal| journal.keys().next_back().copied())
            .unwrap_or(0))
    }
}
