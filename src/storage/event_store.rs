//! EventStore trait definition.

use async_trait::async_trait;
use futures::stream::BoxStream;

use super::Result;
use crate::envelope::EventEnvelope;
use crate::persistence_id::PersistenceId;

/// Lazily produced journal entries, ascending by sequence number.
pub type EventStream<P> = BoxStream<'static, Result<EventEnvelope<P>>>;

/// Interface for the append-only event journal.
///
/// The `(persistence_id, sequence_nr)` pair forms the unique key for stored
/// events. Sequence numbers are supplied by callers, typically
/// `highest_sequence_nr(id) + 1`; the store never assigns or rewrites them.
///
/// Implementations:
/// - `SqliteEventStore`: SQLite storage
/// - `PostgresEventStore`: PostgreSQL storage
/// - `MockEventStore`: In-memory mock for testing
#[async_trait]
pub trait EventStore<P: Send + Sync + 'static>: Send + Sync {
    /// Append events for an identity in a single transaction, in order.
    ///
    /// If any sequence number is already taken (or repeats within the batch)
    /// nothing is written and `StorageError::ConcurrentModification` is
    /// returned carrying the lowest conflicting sequence number.
    async fn persist(&self, id: &PersistenceId, events: &[EventEnvelope<P>]) -> Result<()>;

    /// Stream events with `from <= sequence_nr <= to`.
    ///
    /// No query runs until the stream is first polled. Every call starts a
    /// fresh read.
    fn load(&self, id: &PersistenceId, from_sequence_nr: i64, to_sequence_nr: i64)
        -> EventStream<P>;

    /// Stream every event stored for an identity.
    fn load_all(&self, id: &PersistenceId) -> EventStream<P> {
        self.load(id, 0, i64::MAX)
    }

    /// Remove events with `sequence_nr <= to_sequence_nr`.
    async fn delete_up_to(&self, id: &PersistenceId, to_sequence_nr: i64) -> Result<()>;

    /// Highest stored sequence number, `0` when the journal is empty.
    async fn highest_sequence_nr(&self, id: &PersistenceId) -> Result<i64>;
}
