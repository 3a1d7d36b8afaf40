//! Unified SQL SnapshotStore implementation.
//!
//! Uses a macro to generate implementations for each SQL backend,
//! eliminating code duplication while maintaining type safety.

use std::marker::PhantomData;
use std::sync::Arc;

use sea_query::{DeleteStatement, Expr, InsertStatement, Order, Query, SelectStatement};

use super::SqlDatabase;
use crate::codec::PayloadCodec;
use crate::envelope::SnapshotEnvelope;
use crate::persistence_id::PersistenceId;
use crate::storage::helpers;
use crate::storage::schema::Snapshots;
use crate::storage::Result;

/// SQL-based implementation of SnapshotStore.
///
/// This generic implementation works with any SQL database that implements
/// the `SqlDatabase` trait (PostgreSQL, SQLite).
pub struct SqlSnapshotStore<DB: SqlDatabase, P> {
    pool: DB::Pool,
    codec: Arc<dyn PayloadCodec<P>>,
    _marker: PhantomData<DB>,
}

impl<DB: SqlDatabase, P> SqlSnapshotStore<DB, P> {
    /// Create a new SQL snapshot store with the given pool and payload codec.
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

fn insert_snapshot<P>(
    pid: &str,
    snapshot: &SnapshotEnvelope<P>,
    state_data: Vec<u8>,
) -> InsertStatement {
    Query::insert()
        .into_table(Snapshots::Table)
        .columns([
            Snapshots::PersistenceId,
            Snapshots::SequenceNr,
            Snapshots::StateType,
            Snapshots::StateData,
            Snapshots::Timestamp,
        ])
        .values_panic([
            pid.into(),
            snapshot.sequence_nr.into(),
            snapshot.state_type.clone().into(),
            state_data.into(),
            helpers::format_timestamp(&snapshot.timestamp).into(),
        ])
        .to_owned()
}

fn select_latest(pid: &str) -> SelectStatement {
    Query::select()
        .columns([
            Snapshots::SequenceNr,
            Snapshots::StateType,
            Snapshots::StateData,
            Snapshots::Timestamp,
        ])
        .from(Snapshots::Table)
        .and_where(Expr::col(Snapshots::PersistenceId).eq(pid))
        .order_by(Snapshots::SequenceNr, Order::Desc)
        .limit(1)
        .to_owned()
}

fn delete_through(pid: &str, max_sequence_nr: i64) -> DeleteStatement {
    Query::delete()
        .from_table(Snapshots::Table)
        .and_where(Expr::col(Snapshots::PersistenceId).eq(pid))
        .and_where(Expr::col(Snapshots::SequenceNr).lte(max_sequence_nr))
        .to_owned()
}

/// Macro to implement SnapshotStore for a specific SQL backend.
macro_rules! impl_snapshot_store {
    ($db_type:ty, $feature:literal) => {
        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl<P: Send + Sync + 'static> crate::storage::SnapshotStore<P>
            for SqlSnapshotStore<$db_type, P>
        {
            async fn save(&self, id: &PersistenceId, snapshot: &SnapshotEnvelope<P>) -> Result<()> {
                let state_data = self.codec.serialize(&snapshot.state)?;
                let (sql, values) = <$db_type>::build_insert(&insert_snapshot(
                    &id.to_string(),
                    snapshot,
                    state_data,
                ));

                match sqlx::query_with(&sql, values).execute(&self.pool).await {
                    Ok(_) => {
                        tracing::debug!(
                            persistence_id = %id,
                            sequence_nr = snapshot.sequence_nr,
                            "Saved snapshot"
                        );
                        Ok(())
                    }
                    Err(e) if helpers::is_unique_violation(&e) => {
                        tracing::warn!(
                            persistence_id = %id,
                            sequence_nr = snapshot.sequence_nr,
                            "Snapshot already stored at this sequence number"
                        );
                        Err(crate::storage::StorageError::DuplicateSnapshot {
                            persistence_id: id.clone(),
                            sequence_nr: snapshot.sequence_nr,
                        })
                    }
                    Err(e) => Err(e.into()),
                }
            }

            async fn load(&self, id: &PersistenceId) -> Result<Option<SnapshotEnvelope<P>>> {
                use sqlx::Row;

                let (sql, values) = <$db_type>::build_select(&select_latest(&id.to_string()));
                let row = sqlx::query_with(&sql, values)
                    .fetch_optional(&self.pool)
                    .await?;

                let Some(row) = row else {
                    return Ok(None);
                };

                let state_type: String = row.try_get("state_type")?;
                let state_data: Vec<u8> = row.try_get("state_data")?;
                let timestamp: String = row.try_get("timestamp")?;

                Ok(Some(SnapshotEnvelope {
                    persistence_id: id.clone(),
                    sequence_nr: row.try_get("sequence_nr")?,
                    state: self.codec.deserialize(&state_data, &state_type)?,
                    state_type,
                    timestamp: helpers::parse_timestamp(&timestamp)?,
                }))
            }

            async fn delete(&self, id: &PersistenceId, max_sequence_nr: i64) -> Result<()> {
                let (sql, values) =
                    <$db_type>::build_delete(&delete_through(&id.to_string(), max_sequence_nr));
                let result = sqlx::query_with(&sql, values).execute(&self.pool).await?;

                tracing::debug!(
                    persistence_id = %id,
                    max_sequence_nr,
                    deleted = result.rows_affected(),
                    "Deleted snapshots"
                );
                Ok(())
            }
        }
    };
}

// Generate implementations for each SQL backend
impl_snapshot_store!(super::postgres::Postgres, "postgres");
impl_snapshot_store!(super::sqlite::Sqlite, "sqlite");
