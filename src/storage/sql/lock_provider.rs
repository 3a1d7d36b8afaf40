//! Unified SQL PessimisticLockProvider implementation.
//!
//! Each identity owns a row in `persistence_lock`, created on first use. On
//! engines with row locks the row is taken with `SELECT ... FOR UPDATE`; on
//! SQLite the `BEGIN IMMEDIATE` write lock already excludes every other
//! writer, so the critical section is database-wide.
//!
//! The transaction is held in a `sqlx::Transaction`, which rolls back when
//! dropped. A cancelled or panicking caller therefore releases the lock
//! before its connection is reused.

use std::marker::PhantomData;

use futures::future::BoxFuture;
use sea_query::{Expr, InsertStatement, LockType, OnConflict, Query, SelectStatement};

use super::SqlDatabase;
use crate::persistence_id::PersistenceId;
use crate::storage::schema::PersistenceLock;
use crate::storage::{Result, StorageError};

/// SQL-based implementation of PessimisticLockProvider.
pub struct SqlLockProvider<DB: SqlDatabase> {
    pool: DB::Pool,
    _marker: PhantomData<DB>,
}

impl<DB: SqlDatabase> SqlLockProvider<DB> {
    pub fn new(pool: DB::Pool) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &DB::Pool {
        &self.pool
    }
}

fn insert_lock_row(pid: &str) -> InsertStatement {
    Query::insert()
        .into_table(PersistenceLock::Table)
        .columns([PersistenceLock::PersistenceId])
        .values_panic([pid.into()])
        .on_conflict(
            OnConflict::column(PersistenceLock::PersistenceId)
                .do_nothing()
                .to_owned(),
        )
        .to_owned()
}

fn select_for_update(pid: &str) -> SelectStatement {
    Query::select()
        .column(PersistenceLock::PersistenceId)
        .from(PersistenceLock::Table)
        .and_where(Expr::col(PersistenceLock::PersistenceId).eq(pid))
        .lock(LockType::Update)
        .to_owned()
}

/// Macro to implement PessimisticLockProvider for a specific SQL backend.
macro_rules! impl_lock_provider {
    ($db_type:ty, $feature:literal, connection: $conn:ty) => {
        #[cfg(feature = $feature)]
        impl SqlLockProvider<$db_type> {
            /// Take the lock inside the already-open transaction on `conn`.
            async fn lock_row(conn: &mut $conn, pid: &str) -> Result<()> {
                let (sql, values) = <$db_type>::build_insert(&insert_lock_row(pid));
                sqlx::query_with(&sql, values).execute(&mut *conn).await?;

                if <$db_type as SqlDatabase>::ROW_LOCKS {
                    let (sql, values) = <$db_type>::build_select(&select_for_update(pid));
                    sqlx::query_with(&sql, values).fetch_one(&mut *conn).await?;
                }

                Ok(())
            }
        }

        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl crate::storage::PessimisticLockProvider for SqlLockProvider<$db_type> {
            type Connection = $conn;

            async fn with_lock<R, E, F>(
                &self,
                id: &PersistenceId,
                operation: F,
            ) -> std::result::Result<R, E>
            where
                R: Send,
                E: From<StorageError> + Send,
                F: for<'c> FnOnce(&'c mut Self::Connection) -> BoxFuture<'c, std::result::Result<R, E>>
                    + Send,
            {
                use sqlx::Connection;

                let pid = id.to_string();

                let mut conn = self.pool.acquire().await.map_err(StorageError::from)?;
                let mut tx = conn
                    .begin_with(<$db_type as SqlDatabase>::BEGIN)
                    .await
                    .map_err(StorageError::from)?;

                // Dropping `tx` on any early exit rolls back and frees the lock.
                Self::lock_row(&mut tx, &pid).await?;
                tracing::debug!(persistence_id = %id, "Lock acquired");

                match operation(&mut *tx).await {
                    Ok(value) => {
                        tx.commit().await.map_err(StorageError::from)?;
                        tracing::debug!(persistence_id = %id, "Lock released, committed");
                        Ok(value)
                    }
                    Err(e) => {
                        let _ = tx.rollback().await;
                        tracing::debug!(persistence_id = %id, "Lock released, rolled back");
                        Err(e)
                    }
                }
            }
        }
    };
}

// Generate implementations for each SQL backend
impl_lock_provider!(
    super::postgres::Postgres,
    "postgres",
    connection: sqlx::PgConnection
);
impl_lock_provider!(
    super::sqlite::Sqlite,
    "sqlite",
    connection: sqlx::SqliteConnection
);
