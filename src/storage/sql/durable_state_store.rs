//! Unified SQL DurableStateStore implementation.
//!
//! `upsert` never reads before it writes. A guarded `UPDATE ... WHERE version
//! = expected` handles the replace case and `INSERT ... ON CONFLICT DO NOTHING`
//! the first write; when neither touches a row the version check failed.

use std::marker::PhantomData;
use std::sync::Arc;

use sea_query::{
    DeleteStatement, Expr, InsertStatement, OnConflict, Query, SelectStatement, UpdateStatement,
};

use super::SqlDatabase;
use crate::codec::PayloadCodec;
use crate::envelope::DurableStateEnvelope;
use crate::persistence_id::PersistenceId;
use crate::storage::helpers;
use crate::storage::schema::DurableState;
use crate::storage::Result;

/// SQL-based implementation of DurableStateStore.
pub struct SqlDurableStateStore<DB: SqlDatabase, P> {
    pool: DB::Pool,
    codec: Arc<dyn PayloadCodec<P>>,
    _marker: PhantomData<DB>,
}

impl<DB: SqlDatabase, P> SqlDurableStateStore<DB, P> {
    pub fn new(pool: DB::Pool, codec: Arc<dyn PayloadCodec<P>>) -> Self {
        Self {
            pool,
            codec,
            _marker: PhantomData,
        }
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &DB::Pool {
        &self.pool
    }
}

/// Encoded durable state row.
struct StateRow {
    version: i64,
    state_type: String,
    state_data: Vec<u8>,
    timestamp: String,
}

fn update_if_at(pid: &str, row: &StateRow) -> UpdateStatement {
    Query::update()
        .table(DurableState::Table)
        .values([
            (DurableState::Version, row.version.into()),
            (DurableState::StateType, row.state_type.clone().into()),
            (DurableState::StateData, row.state_data.clone().into()),
            (DurableState::Timestamp, row.timestamp.clone().into()),
        ])
        .and_where(Expr::col(DurableState::PersistenceId).eq(pid))
        .and_where(Expr::col(DurableState::Version).eq(row.version - 1))
        .to_owned()
}

fn insert_if_absent(pid: &str, row: StateRow) -> InsertStatement {
    Query::insert()
        .into_table(DurableState::Table)
        .columns([
            DurableState::PersistenceId,
            DurableState::Version,
            DurableState::StateType,
            DurableState::StateData,
            DurableState::Timestamp,
        ])
        .values_panic([
            pid.into(),
            row.version.into(),
            row.state_type.into(),
            row.state_data.into(),
            row.timestamp.into(),
        ])
        .on_conflict(
            OnConflict::column(DurableState::PersistenceId)
                .do_nothing()
                .to_owned(),
        )
        .to_owned()
}

fn select_state(pid: &str) -> SelectStatement {
    Query::select()
        .columns([
            DurableState::Version,
            DurableState::StateType,
            DurableState::StateData,
            DurableState::Timestamp,
        ])
        .from(DurableState::Table)
        .and_where(Expr::col(DurableState::PersistenceId).eq(pid))
        .to_owned()
}

fn delete_state(pid: &str) -> DeleteStatement {
    Query::delete()
        .from_table(DurableState::Table)
        .and_where(Expr::col(DurableState::PersistenceId).eq(pid))
        .to_owned()
}

/// Macro to implement DurableStateStore for a specific SQL backend.
macro_rules! impl_durable_state_store {
    ($db_type:ty, $feature:literal, connection: $conn:ty) => {
        #[cfg(feature = $feature)]
        impl<P: Send + Sync + 'static> SqlDurableStateStore<$db_type, P> {
            /// Returns `false` when the row exists at a version other than
            /// `row.version - 1`.
            async fn write_state(conn: &mut $conn, pid: &str, row: StateRow) -> Result<bool> {
                let (sql, values) = <$db_type>::build_update(&update_if_at(pid, &row));
                let updated = sqlx::query_with(&sql, values).execute(&mut *conn).await?;
                if updated.rows_affected() > 0 {
                    return Ok(true);
                }

                let (sql, values) = <$db_type>::build_insert(&insert_if_absent(pid, row));
                let inserted = sqlx::query_with(&sql, values).execute(&mut *conn).await?;
                Ok(inserted.rows_affected() > 0)
            }
        }

        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl<P: Send + Sync + 'static> crate::storage::DurableStateStore<P>
            for SqlDurableStateStore<$db_type, P>
        {
            async fn get(&self, id: &PersistenceId) -> Result<Option<DurableStateEnvelope<P>>> {
                use sqlx::Row;

                let (sql, values) = <$db_type>::build_select(&select_state(&id.to_string()));
                let row = sqlx::query_with(&sql, values)
                    .fetch_optional(&self.pool)
                    .await?;

                match row {
                    Some(row) => {
                        let state_type: String = row.try_get("state_type")?;
                        let state_data: Vec<u8> = row.try_get("state_data")?;
                        let timestamp: String = row.try_get("timestamp")?;

                        Ok(Some(DurableStateEnvelope {
                            persistence_id: id.clone(),
                            version: row.try_get("version")?,
                            state: self.codec.deserialize(&state_data, &state_type)?,
                            state_type,
                            timestamp: helpers::parse_timestamp(&timestamp)?,
                        }))
                    }
                    None => Ok(None),
                }
            }

            async fn upsert(
                &self,
                id: &PersistenceId,
                state: &DurableStateEnvelope<P>,
            ) -> Result<()> {
                use sqlx::Connection;

                helpers::validate_version(id, state.version)?;

                let row = StateRow {
                    version: state.version,
                    state_type: state.state_type.clone(),
                    state_data: self.codec.serialize(&state.state)?,
                    timestamp: helpers::format_timestamp(&state.timestamp),
                };
                let pid = id.to_string();

                let mut conn = self.pool.acquire().await?;
                let mut tx = conn.begin_with(<$db_type as SqlDatabase>::BEGIN).await?;

                match Self::write_state(&mut tx, &pid, row).await {
                    Ok(true) => {
                        tx.commit().await?;
                        tracing::debug!(persistence_id = %id, version = state.version, "Upserted state");
                        Ok(())
                    }
                    Ok(false) => {
                        let _ = tx.rollback().await;
                        tracing::warn!(
                            persistence_id = %id,
                            version = state.version,
                            "Durable state version check failed"
                        );
                        Err(crate::storage::StorageError::conflict(id, state.version - 1))
                    }
                    Err(e) => {
                        let _ = tx.rollback().await;
                        Err(e)
                    }
                }
            }

            async fn delete(&self, id: &PersistenceId) -> Result<()> {
                let (sql, values) = <$db_type>::build_delete(&delete_state(&id.to_string()));
                let result = sqlx::query_with(&sql, values).execute(&self.pool).await?;

                tracing::debug!(
                    persistence_id = %id,
                    deleted = result.rows_affected(),
                    "Deleted state"
                );
                Ok(())
            }
        }
    };
}

// Generate implementations for each SQL backend
impl_durable_state_store!(
    super::postgres::Postgres,
    "postgres",
    connection: sqlx::PgConnection
);
impl_durable_state_store!(
    super::sqlite::Sqlite,
    "sqlite",
    connection: sqlx::SqliteConnection
);
