//! Database schema definitions.
//!
//! The `Iden` enums name tables and columns for type-safe query building with
//! sea-query. DDL is kept as plain SQL per backend and applied by
//! [`SchemaManager`].

use std::marker::PhantomData;

use sea_query::Iden;

use super::sql::SqlDatabase;

/// Event journal table schema.
#[derive(Iden)]
pub enum EventJournal {
    #[iden = "event_journal"]
    Table,
    #[iden = "persistence_id"]
    PersistenceId,
    #[iden = "sequence_nr"]
    SequenceNr,
    #[iden = "event_type"]
    EventType,
    #[iden = "event_data"]
    EventData,
    #[iden = "metadata"]
    Metadata,
    #[iden = "timestamp"]
    Timestamp,
}

/// Snapshot table schema.
#[derive(Iden)]
pub enum Snapshots {
    #[iden = "snapshot_store"]
    Table,
    #[iden = "persistence_id"]
    PersistenceId,
    #[iden = "sequence_nr"]
    SequenceNr,
    #[iden = "state_type"]
    StateType,
    #[iden = "state_data"]
    StateData,
    #[iden = "timestamp"]
    Timestamp,
}

/// Durable state table schema.
#[derive(Iden)]
pub enum DurableState {
    #[iden = "durable_state"]
    Table,
    #[iden = "persistence_id"]
    PersistenceId,
    #[iden = "version"]
    Version,
    #[iden = "state_type"]
    StateType,
    #[iden = "state_data"]
    StateData,
    #[iden = "timestamp"]
    Timestamp,
}

/// Lock target table schema.
#[derive(Iden)]
pub enum PersistenceLock {
    #[iden = "persistence_lock"]
    Table,
    #[iden = "persistence_id"]
    PersistenceId,
}

/// SQLite DDL, one statement per entry.
pub const SQLITE_SCHEMA: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS event_journal (
    persistence_id TEXT NOT NULL,
    sequence_nr INTEGER NOT NULL,
    event_type TEXT NOT NULL,
    event_data BLOB NOT NULL,
    metadata TEXT,
    timestamp TEXT NOT NULL,
    PRIMARY KEY (persistence_id, sequence_nr)
)"#,
    "CREATE INDEX IF NOT EXISTS idx_event_journal_pid ON event_journal(persistence_id)",
    r#"
CREATE TABLE IF NOT EXISTS snapshot_store (
    persistence_id TEXT NOT NULL,
    sequence_nr INTEGER NOT NULL,
    state_type TEXT NOT NULL,
    state_data BLOB NOT NULL,
    timestamp TEXT NOT NULL,
    PRIMARY KEY (persistence_id, sequence_nr)
)"#,
    r#"
CREATE TABLE IF NOT EXISTS durable_state (
    persistence_id TEXT NOT NULL PRIMARY KEY,
    version INTEGER NOT NULL,
    state_type TEXT NOT NULL,
    state_data BLOB NOT NULL,
    timestamp TEXT NOT NULL
)"#,
    r#"
CREATE TABLE IF NOT EXISTS persistence_lock (
    persistence_id TEXT NOT NULL PRIMARY KEY
)"#,
];

/// PostgreSQL DDL, one statement per entry.
pub const POSTGRES_SCHEMA: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS event_journal (
    persistence_id VARCHAR(255) NOT NULL,
    sequence_nr BIGINT NOT NULL,
    event_type VARCHAR(255) NOT NULL,
    event_data BYTEA NOT NULL,
    metadata TEXT,
    timestamp VARCHAR(64) NOT NULL,
    PRIMARY KEY (persistence_id, sequence_nr)
)"#,
    "CREATE INDEX IF NOT EXISTS idx_event_journal_pid ON event_journal(persistence_id)",
    r#"
CREATE TABLE IF NOT EXISTS snapshot_store (
    persistence_id VARCHAR(255) NOT NULL,
    sequence_nr BIGINT NOT NULL,
    state_type VARCHAR(255) NOT NULL,
    state_data BYTEA NOT NULL,
    timestamp VARCHAR(64) NOT NULL,
    PRIMARY KEY (persistence_id, sequence_nr)
)"#,
    r#"
CREATE TABLE IF NOT EXISTS durable_state (
    persistence_id VARCHAR(255) NOT NULL PRIMARY KEY,
    version BIGINT NOT NULL,
    state_type VARCHAR(255) NOT NULL,
    state_data BYTEA NOT NULL,
    timestamp VARCHAR(64) NOT NULL
)"#,
    r#"
CREATE TABLE IF NOT EXISTS persistence_lock (
    persistence_id VARCHAR(255) NOT NULL PRIMARY KEY
)"#,
];

/// Drops every persistence table; shared by both backends.
pub const DROP_SCHEMA: &[&str] = &[
    "DROP TABLE IF EXISTS event_journal",
    "DROP TABLE IF EXISTS snapshot_store",
    "DROP TABLE IF EXISTS durable_state",
    "DROP TABLE IF EXISTS persistence_lock",
];

/// Creates and drops the persistence tables. Both operations are idempotent.
pub struct SchemaManager<DB: SqlDatabase> {
    pool: DB::Pool,
    _marker: PhantomData<DB>,
}

impl<DB: SqlDatabase> SchemaManager<DB> {
    pub fn new(pool: DB::Pool) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }
}

/// Macro to implement schema management for a specific SQL backend.
macro_rules! impl_schema_manager {
    ($db_type:ty, $feature:literal) => {
        #[cfg(feature = $feature)]
        impl SchemaManager<$db_type> {
            /// Create every table and index that does not exist yet.
            pub async fn create_schema(&self) -> super::Result<()> {
                for statement in <$db_type as SqlDatabase>::CREATE_SCHEMA {
                    sqlx::query(statement).execute(&self.pool).await?;
                }
                tracing::info!(backend = $feature, "Persistence schema created");
                Ok(())
            }

            /// Drop every persistence table that exists.
            pub async fn drop_schema(&self) -> super::Result<()> {
                for statement in DROP_SCHEMA {
                    sqlx::query(statement).execute(&self.pool).await?;
                }
                tracing::info!(backend = $feature, "Persistence schema dropped");
                Ok(())
            }
        }
    };
}

impl_schema_manager!(super::sql::postgres::Postgres, "postgres");
impl_schema_manager!(super::sql::sqlite::Sqlite, "sqlite");
