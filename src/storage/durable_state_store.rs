//! DurableStateStore trait definition.

use async_trait::async_trait;

use super::Result;
use crate::envelope::DurableStateEnvelope;
use crate::persistence_id::PersistenceId;

/// Interface for latest-value persistence with optimistic concurrency.
///
/// Exactly one row exists per identity. Its version moves forward by one on
/// every successful `upsert`:
///
/// ```text
/// absent --upsert(v)--> v --upsert(v+1)--> v+1 --upsert(other)--> v+1, Err(conflict)
///   ^                                                               |
///   +---------------------------- delete ---------------------------+
/// ```
#[async_trait]
pub trait DurableStateStore<P: Send + Sync + 'static>: Send + Sync {
    async fn get(&self, id: &PersistenceId) -> Result<Option<DurableStateEnvelope<P>>>;

    /// Write `state`, whose `version` is the version being committed.
    ///
    /// Inserts when no row exists. Otherwise replaces the row only if it holds
    /// `state.version - 1`, failing with `StorageError::ConcurrentModification`
    /// (expected = `state.version - 1`) and leaving the row untouched if not.
    /// The check and the write are a single conditional statement against the
    /// engine.
    async fn upsert(&self, id: &PersistenceId, state: &DurableStateEnvelope<P>) -> Result<()>;

    /// Remove the row. No-op when absent.
    async fn delete(&self, id: &PersistenceId) -> Result<()>;
}
