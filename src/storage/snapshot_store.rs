//! SnapshotStore trait definition.

use async_trait::async_trait;

use super::Result;
use crate::envelope::SnapshotEnvelope;
use crate::persistence_id::PersistenceId;

/// Interface for snapshot persistence.
///
/// Snapshots are an optional optimization to avoid replaying entire event
/// histories. Several may exist per identity; only the one with the greatest
/// sequence number is returned on load. They carry no concurrency control and
/// the journal never depends on them.
///
/// # Implementations
///
/// - `PostgresSnapshotStore`: PostgreSQL storage
/// - `SqliteSnapshotStore`: SQLite storage
/// - `MockSnapshotStore`: In-memory mock for testing
#[async_trait]
pub trait SnapshotStore<P: Send + Sync + 'static>: Send + Sync {
    /// Append a snapshot.
    ///
    /// Storing a second snapshot at the same sequence number fails with
    /// `StorageError::DuplicateSnapshot` and leaves the first in place.
    async fn save(&self, id: &PersistenceId, snapshot: &SnapshotEnvelope<P>) -> Result<()>;

    /// Retrieve the latest snapshot, `None` if none exists.
    async fn load(&self, id: &PersistenceId) -> Result<Option<SnapshotEnvelope<P>>>;

    /// Remove snapshots with `sequence_nr <= max_sequence_nr`.
    async fn delete(&self, id: &PersistenceId, max_sequence_nr: i64) -> Result<()>;
}
