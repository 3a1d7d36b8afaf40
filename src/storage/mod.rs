//! Storage implementations.
//!
//! Four independent stores share one relational engine:
//! - [`EventStore`]: append-only journal, duplicate sequence numbers rejected by the engine
//! - [`SnapshotStore`]: advisory state captures, no concurrency control
//! - [`DurableStateStore`]: one row per identity, optimistic version checks
//! - [`PessimisticLockProvider`]: per-identity critical sections
//!
//! SQL implementations live in [`sql`] (one backend per cargo feature),
//! in-memory ones in [`mock`].

use tracing::{error, info};

use crate::codec::CodecError;
use crate::config::{StorageConfig, StorageType};
use crate::persistence_id::PersistenceId;

pub mod durable_state_store;
pub mod event_store;
pub mod helpers;
pub mod lock_provider;
pub mod mock;
pub mod schema;
pub mod snapshot_store;
pub mod sql;

pub use durable_state_store::DurableStateStore;
pub use event_store::{EventStore, EventStream};
pub use lock_provider::PessimisticLockProvider;
pub use schema::SchemaManager;
pub use snapshot_store::SnapshotStore;

#[cfg(feature = "postgres")]
pub use sql::postgres::{
    PostgresDurableStateStore, PostgresEventStore, PostgresLockProvider, PostgresSnapshotStore,
};
#[cfg(feature = "sqlite")]
pub use sql::sqlite::{
    SqliteDurableStateStore, SqliteEventStore, SqliteLockProvider, SqliteSnapshotStore,
};

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Another writer got there first: a journal sequence number was already
    /// taken, or the durable state row is not at the expected version.
    #[error("Concurrent modification of '{persistence_id}': expected {expected}")]
    ConcurrentModification {
        persistence_id: PersistenceId,
        expected: i64,
    },

    #[error("Snapshot already stored for '{persistence_id}' at sequence {sequence_nr}")]
    DuplicateSnapshot {
        persistence_id: PersistenceId,
        sequence_nr: i64,
    },

    #[error("Invalid sequence number {sequence_nr} for '{persistence_id}': must be positive")]
    InvalidSequence {
        persistence_id: PersistenceId,
        sequence_nr: i64,
    },

    #[error("Invalid version {version} for '{persistence_id}': must be at least 1")]
    InvalidVersion {
        persistence_id: PersistenceId,
        version: i64,
    },

    #[error("Invalid stored timestamp '{value}': {source}")]
    InvalidTimestamp {
        value: String,
        source: chrono::ParseError,
    },

    #[error("Invalid stored metadata: {0}")]
    InvalidMetadata(serde_json::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage backend '{0}' is not enabled in this build")]
    UnsupportedBackend(String),
}

impl StorageError {
    pub fn conflict(persistence_id: &PersistenceId, expected: i64) -> Self {
        StorageError::ConcurrentModification {
            persistence_id: persistence_id.clone(),
            expected,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::ConcurrentModification { .. })
    }

    /// Identity involved in a concurrency conflict.
    pub fn persistence_id(&self) -> Option<&PersistenceId> {
        match self {
            StorageError::ConcurrentModification { persistence_id, .. } => Some(persistence_id),
            _ => None,
        }
    }

    /// Conflicting sequence number (journal) or expected version (durable state).
    pub fn expected(&self) -> Option<i64> {
        match self {
            StorageError::ConcurrentModification { expected, .. } => Some(*expected),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// A connected backing engine.
pub enum Backend {
    #[cfg(feature = "sqlite")]
    Sqlite(sqlx::SqlitePool),
    #[cfg(feature = "postgres")]
    Postgres(sqlx::PgPool),
}

impl Backend {
    /// Create the four persistence tables if they do not exist.
    pub async fn create_schema(&self) -> Result<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Backend::Sqlite(pool) => {
                SchemaManager::<sql::sqlite::Sqlite>::new(pool.clone())
                    .create_schema()
                    .await
            }
            #[cfg(feature = "postgres")]
            Backend::Postgres(pool) => {
                SchemaManager::<sql::postgres::Postgres>::new(pool.clone())
                    .create_schema()
                    .await
            }
        }
    }

    /// Drop the four persistence tables if they exist.
    pub async fn drop_schema(&self) -> Result<()> {
        match self {
            #[cfg(feature = "sqlite")]
            Backend::Sqlite(pool) => {
                SchemaManager::<sql::sqlite::Sqlite>::new(pool.clone())
                    .drop_schema()
                    .await
            }
            #[cfg(feature = "postgres")]
            Backend::Postgres(pool) => {
                SchemaManager::<sql::postgres::Postgres>::new(pool.clone())
                    .drop_schema()
                    .await
            }
        }
    }
}

/// Connect to the backend selected by configuration.
pub async fn connect(config: &StorageConfig) -> Result<Backend> {
    info!("Storage: {} at {}", config.storage_type, config.url);

    match config.storage_type {
        #[cfg(feature = "sqlite")]
        StorageType::Sqlite => Ok(Backend::Sqlite(connect_sqlite(config).await?)),
        #[cfg(feature = "postgres")]
        StorageType::Postgres => Ok(Backend::Postgres(connect_postgres(config).await?)),
        #[allow(unreachable_patterns)]
        other => {
            error!("Storage type '{}' requested but its feature is not enabled", other);
            Err(StorageError::UnsupportedBackend(other.to_string()))
        }
    }
}

/// Open a SQLite pool, creating the database file when missing.
///
/// `busy_timeout_ms` also caps how long `with_lock` waits for the database
/// write lock; past it the call fails with "database is locked".
#[cfg(feature = "sqlite")]
pub async fn connect_sqlite(config: &StorageConfig) -> Result<sqlx::SqlitePool> {
    use std::str::FromStr;
    use std::time::Duration;

    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Open a PostgreSQL pool.
#[cfg(feature = "postgres")]
pub async fn connect_postgres(config: &StorageConfig) -> Result<sqlx::PgPool> {
    use std::str::FromStr;
    use std::time::Duration;

    use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

    let options = PgConnectOptions::from_str(&config.url)?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_millis(config.busy_timeout_ms))
        .connect_with(options)
        .await?;

    Ok(pool)
}
