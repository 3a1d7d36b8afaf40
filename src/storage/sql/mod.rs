//! Unified SQL storage implementations.
//!
//! This module provides shared implementations for SQL-based storage backends
//! (PostgreSQL, SQLite). The implementations are parameterized by database type
//! using the `SqlDatabase` trait.

mod durable_state_store;
mod event_store;
mod lock_provider;
mod query;
mod snapshot_store;

pub use durable_state_store::SqlDurableStateStore;
pub use event_store::SqlEventStore;
pub use lock_provider::SqlLockProvider;
pub use query::SqlDatabase;
pub use snapshot_store::SqlSnapshotStore;

#[cfg(feature = "postgres")]
pub mod postgres {
    //! PostgreSQL database backend.

    use sea_query::PostgresQueryBuilder;
    use sea_query_binder::{SqlxBinder, SqlxValues};
    use sqlx::PgPool;

    /// PostgreSQL database marker type.
    pub struct Postgres;

    impl super::SqlDatabase for Postgres {
        type Pool = PgPool;

        const BEGIN: &'static str = "BEGIN";
        const ROW_LOCKS: bool = true;
        const CREATE_SCHEMA: &'static [&'static str] = crate::storage::schema::POSTGRES_SCHEMA;

        fn build_select(stmt: &sea_query::SelectStatement) -> (String, SqlxValues) {
            stmt.build_sqlx(PostgresQueryBuilder)
        }

        fn build_insert(stmt: &sea_query::InsertStatement) -> (String, SqlxValues) {
            stmt.build_sqlx(PostgresQueryBuilder)
        }

        fn build_update(stmt: &sea_query::UpdateStatement) -> (String, SqlxValues) {
            stmt.build_sqlx(PostgresQueryBuilder)
        }

        fn build_delete(stmt: &sea_query::DeleteStatement) -> (String, SqlxValues) {
            stmt.build_sqlx(PostgresQueryBuilder)
        }
    }

    /// PostgreSQL event store.
    pub type PostgresEventStore<P> = super::SqlEventStore<Postgres, P>;

    /// PostgreSQL snapshot store.
    pub type PostgresSnapshotStore<P> = super::SqlSnapshotStore<Postgres, P>;

    /// PostgreSQL durable state store.
    pub type PostgresDurableStateStore<P> = super::SqlDurableStateStore<Postgres, P>;

    /// PostgreSQL lock provider (`SELECT ... FOR UPDATE`).
    pub type PostgresLockProvider = super::SqlLockProvider<Postgres>;
}

#[cfg(feature = "sqlite")]
pub mod sqlite {
    //! SQLite database backend.
    //!
    //! SQLite has no row locks. Writing transactions open with
    //! `BEGIN IMMEDIATE`, which takes the database write lock up front and
    //! avoids deadlocks when concurrent deferred transactions race to upgrade
    //! from shared to exclusive.
    //!
    //! Waiting for that lock is bounded by the connection's busy timeout
    //! (`StorageConfig::busy_timeout_ms`). A lock seeker that waits longer
    //! fails with `SQLITE_BUSY` ("database is locked") instead of blocking
    //! until the holder finishes.

    use sea_query::SqliteQueryBuilder;
    use sea_query_binder::{SqlxBinder, SqlxValues};
    use sqlx::SqlitePool;

    /// SQLite database marker type.
    pub struct Sqlite;

    impl super::SqlDatabase for Sqlite {
        type Pool = SqlitePool;

        const BEGIN: &'static str = "BEGIN IMMEDIATE";
        const ROW_LOCKS: bool = false;
        const CREATE_SCHEMA: &'static [&'static str] = crate::storage::schema::SQLITE_SCHEMA;

        fn build_select(stmt: &sea_query::SelectStatement) -> (String, SqlxValues) {
            stmt.build_sqlx(SqliteQueryBuilder)
        }

        fn build_insert(stmt: &sea_query::InsertStatement) -> (String, SqlxValues) {
            stmt.build_sqlx(SqliteQueryBuilder)
        }

        fn build_update(stmt: &sea_query::UpdateStatement) -> (String, SqlxValues) {
            stmt.build_sqlx(SqliteQueryBuilder)
        }

        fn build_delete(stmt: &sea_query::DeleteStatement) -> (String, SqlxValues) {
            stmt.build_sqlx(SqliteQueryBuilder)
        }
    }

    /// SQLite event store.
    pub type SqliteEventStore<P> = super::SqlEventStore<Sqlite, P>;

    /// SQLite snapshot store.
    pub type SqliteSnapshotStore<P> = super::SqlSnapshotStore<Sqlite, P>;

    /// SQLite durable state store.
    pub type SqliteDurableStateStore<P> = super::SqlDurableStateStore<Sqlite, P>;

    /// SQLite lock provider (database-wide write lock).
    pub type SqliteLockProvider = super::SqlLockProvider<Sqlite>;
}
