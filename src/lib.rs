//! Angzarr Persistence - relational storage for event-sourced entities
//!
//! Four independent stores over PostgreSQL or SQLite:
//! an append-only event journal, a snapshot store, a durable state store
//! with optimistic version checks, and a pessimistic lock provider.
//!
//! ```ignore
//! let config = Config::load()?;
//! let backend = storage::connect(&config.storage).await?;
//! backend.create_schema().await?;
//!
//! let Backend::Sqlite(pool) = backend;
//! let journal = SqliteEventStore::new(pool, Arc::new(JsonCodec::<OrderEvent>::new()));
//! let next = journal.highest_sequence_nr(&id).await? + 1;
//! journal.persist(&id, &[EventEnvelope::new(id.clone(), next, "Placed", event)]).await?;
//! ```

#[cfg(not(any(feature = "sqlite", feature = "postgres")))]
compile_error!("enable at least one storage backend feature: `sqlite` or `postgres`");

pub mod codec;
pub mod config;
pub mod envelope;
pub mod persistence_id;
pub mod storage;
pub mod utils;

pub use codec::{AnyCodec, CodecError, CodecRegistry, JsonCodec, PayloadCodec, ProstCodec};
pub use config::{Config, ConfigError, StorageConfig, StorageType};
pub use envelope::{DurableStateEnvelope, EventEnvelope, Metadata, SnapshotEnvelope};
pub use persistence_id::PersistenceId;
pub use storage::{
    Backend, DurableStateStore, EventStore, EventStream, PessimisticLockProvider, SchemaManager,
    SnapshotStore, StorageError,
};
