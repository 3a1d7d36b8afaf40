//! Unified SQL EventStore implementation.
//!
//! Duplicate detection is left to the `(persistence_id, sequence_nr)` primary
//! key: a batch is inserted row by row inside one transaction and the first
//! unique violation rolls the whole batch back. There is no read before the
//! write.

use std::marker::PhantomData;
use std::sync::Arc;

use sea_query::{DeleteStatement, Expr, InsertStatement, Order, Query, SelectStatement};

use super::SqlDatabase;
use crate::codec::PayloadCodec;
use crate::envelope::EventEnvelope;
use crate::persistence_id::PersistenceId;
use crate::storage::helpers;
use crate::storage::schema::EventJournal;
use crate::storage::Result;

/// SQL-based implementation of EventStore.
///
/// This generic implementation works with any SQL database that implements
/// the `SqlDatabase` trait (PostgreSQL, SQLite).
pub struct SqlEventStore<DB: SqlDatabase, P> {
    pool: DB::Pool,
    codec: Arc<dyn PayloadCodec<P>>,
    _marker: PhantomData<DB>,
}

impl<DB: SqlDatabase, P> SqlEventStore<DB, P> {
    /// Create a new SQL event store with the given pool and payload codec.
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

/// A journal row with its payload already encoded.
struct EventRow {
    sequence_nr: i64,
    event_type: String,
    event_data: Vec<u8>,
    metadata: Option<String>,
    timestamp: String,
}

/// Encode a whole batch up front so codec failures happen before the
/// transaction starts.
fn encode_rows<P>(
    codec: &dyn PayloadCodec<P>,
    events: &[EventEnvelope<P>],
) -> Result<Vec<EventRow>> {
    events
        .iter()
        .map(|event| {
            Ok(EventRow {
                sequence_nr: event.sequence_nr,
                event_type: event.event_type.clone(),
                event_data: codec.serialize(&event.event)?,
                metadata: helpers::encode_metadata(&event.metadata)?,
                timestamp: helpers::format_timestamp(&event.timestamp),
            })
        })
        .collect()
}

fn insert_event(pid: &str, row: EventRow) -> InsertStatement {
    Query::insert()
        .into_table(EventJournal::Table)
        .columns([
            EventJournal::PersistenceId,
            EventJournal::SequenceNr,
            EventJournal::EventType,
            EventJournal::EventData,
            EventJournal::Metadata,
            EventJournal::Timestamp,
        ])
        .values_panic([
            pid.into(),
            row.sequence_nr.into(),
            row.event_type.into(),
            row.event_data.into(),
            row.metadata.into(),
            row.timestamp.into(),
        ])
        .to_owned()
}

fn select_range(pid: &str, from_sequence_nr: i64, to_sequence_nr: i64) -> SelectStatement {
    Query::select()
        .columns([
            EventJournal::SequenceNr,
            EventJournal::EventType,
            EventJournal::EventData,
            EventJournal::Metadata,
            EventJournal::Timestamp,
        ])
        .from(EventJournal::Table)
        .and_where(Expr::col(EventJournal::PersistenceId).eq(pid))
        .and_where(Expr::col(EventJournal::SequenceNr).gte(from_sequence_nr))
        .and_where(Expr::col(EventJournal::SequenceNr).lte(to_sequence_nr))
        .order_by(EventJournal::SequenceNr, Order::Asc)
        .to_owned()
}

fn select_highest(pid: &str) -> SelectStatement {
    Query::select()
        .expr(Expr::col(EventJournal::SequenceNr).max())
        .from(EventJournal::Table)
        .and_where(Expr::col(EventJournal::PersistenceId).eq(pid))
        .to_owned()
}

fn select_lowest_stored(pid: &str, sequences: &[i64]) -> SelectStatement {
    Query::select()
        .expr(Expr::col(EventJournal::SequenceNr).min())
        .from(EventJournal::Table)
        .and_where(Expr::col(EventJournal::PersistenceId).eq(pid))
        .and_where(Expr::col(EventJournal::SequenceNr).is_in(sequences.iter().copied()))
        .to_owned()
}

fn delete_up_to(pid: &str, to_sequence_nr: i64) -> DeleteStatement {
    Query::delete()
        .from_table(EventJournal::Table)
        .and_where(Expr::col(EventJournal::PersistenceId).eq(pid))
        .and_where(Expr::col(EventJournal::SequenceNr).lte(to_sequence_nr))
        .to_owned()
}

/// Macro to implement EventStore for a specific SQL backend.
macro_rules! impl_event_store {
    ($db_type:ty, $feature:literal, connection: $conn:ty, row: $row:ty) => {
        #[cfg(feature = $feature)]
        impl<P: Send + Sync + 'static> SqlEventStore<$db_type, P> {
            /// Insert rows within an already-started transaction.
            async fn insert_events(
                conn: &mut $conn,
                id: &PersistenceId,
                rows: Vec<EventRow>,
            ) -> Result<()> {
                let pid = id.to_string();

                for row in rows {
                    let sequence_nr = row.sequence_nr;
                    let (sql, values) = <$db_type>::build_insert(&insert_event(&pid, row));

                    if let Err(e) = sqlx::query_with(&sql, values).execute(&mut *conn).await {
                        if helpers::is_unique_violation(&e) {
                            return Err(crate::storage::StorageError::conflict(id, sequence_nr));
                        }
                        return Err(e.into());
                    }
                }

                Ok(())
            }

            /// Lowest sequence number of `sequences` already in the journal.
            async fn lowest_stored(
                conn: &mut $conn,
                id: &PersistenceId,
                sequences: &[i64],
            ) -> Result<Option<i64>> {
                use sqlx::Row;

                let (sql, values) =
                    <$db_type>::build_select(&select_lowest_stored(&id.to_string(), sequences));
                let row = sqlx::query_with(&sql, values).fetch_one(&mut *conn).await?;

                Ok(row.try_get::<Option<i64>, _>(0)?)
            }

            fn decode(
                id: &PersistenceId,
                codec: &dyn PayloadCodec<P>,
                row: &$row,
            ) -> Result<EventEnvelope<P>> {
                use sqlx::Row;

                let event_type: String = row.try_get("event_type")?;
                let event_data: Vec<u8> = row.try_get("event_data")?;
                let metadata: Option<String> = row.try_get("metadata")?;
                let timestamp: String = row.try_get("timestamp")?;

                Ok(EventEnvelope {
                    persistence_id: id.clone(),
                    sequence_nr: row.try_get("sequence_nr")?,
                    event: codec.deserialize(&event_data, &event_type)?,
                    event_type,
                    timestamp: helpers::parse_timestamp(&timestamp)?,
                    metadata: helpers::decode_metadata(metadata.as_deref())?,
                })
            }

            fn stream_events(
                pool: <$db_type as SqlDatabase>::Pool,
                codec: Arc<dyn PayloadCodec<P>>,
                id: PersistenceId,
                sql: String,
                values: sea_query_binder::SqlxValues,
            ) -> impl futures::Stream<Item = Result<EventEnvelope<P>>> + Send + 'static {
                use futures::TryStreamExt;

                async_stream::try_stream! {
                    let mut rows = sqlx::query_with(&sql, values).fetch(&pool);

                    while let Some(row) = rows
                        .try_next()
                        .await
                        .map_err(crate::storage::StorageError::from)?
                    {
                        yield Self::decode(&id, codec.as_ref(), &row)?;
                    }
                }
            }
        }

        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl<P: Send + Sync + 'static> crate::storage::EventStore<P> for SqlEventStore<$db_type, P> {
            async fn persist(&self, id: &PersistenceId, events: &[EventEnvelope<P>]) -> Result<()> {
                use crate::storage::StorageError;
                use sqlx::Connection;

                if events.is_empty() {
                    return Ok(());
                }

                helpers::validate_sequences(id, events)?;
                let rows = encode_rows(self.codec.as_ref(), events)?;
                let sequences: Vec<i64> = rows.iter().map(|row| row.sequence_nr).collect();

                let mut conn = self.pool.acquire().await?;
                let mut tx = conn.begin_with(<$db_type as SqlDatabase>::BEGIN).await?;

                let result = Self::insert_events(&mut tx, id, rows).await;

                match result {
                    Ok(()) => {
                        tx.commit().await?;
                        tracing::debug!(
                            persistence_id = %id,
                            count = sequences.len(),
                            "Persisted events"
                        );
                        Ok(())
                    }
                    Err(StorageError::ConcurrentModification {
                        expected: rejected, ..
                    }) => {
                        let _ = tx.rollback().await;

                        let stored = match Self::lowest_stored(&mut conn, id, &sequences).await {
                            Ok(stored) => stored,
                            Err(e) => {
                                tracing::warn!(
                                    persistence_id = %id,
                                    error = %e,
                                    "Could not look up conflicting sequence numbers"
                                );
                                None
                            }
                        };
                        let expected = helpers::lowest_conflict(&sequences, rejected, stored);

                        tracing::warn!(
                            persistence_id = %id,
                            sequence_nr = expected,
                            "Duplicate sequence number, batch rejected"
                        );
                        Err(StorageError::conflict(id, expected))
                    }
                    Err(e) => {
                        let _ = tx.rollback().await;
                        Err(e)
                    }
                }
            }

            fn load(
                &self,
                id: &PersistenceId,
                from_sequence_nr: i64,
                to_sequence_nr: i64,
            ) -> crate::storage::EventStream<P> {
                let (sql, values) = <$db_type>::build_select(&select_range(
                    &id.to_string(),
                    from_sequence_nr,
                    to_sequence_nr,
                ));

                Box::pin(Self::stream_events(
                    self.pool.clone(),
                    Arc::clone(&self.codec),
                    id.clone(),
                    sql,
                    values,
                ))
            }

            async fn delete_up_to(&self, id: &PersistenceId, to_sequence_nr: i64) -> Result<()> {
                let (sql, values) =
                    <$db_type>::build_delete(&delete_up_to(&id.to_string(), to_sequence_nr));
                let result = sqlx::query_with(&sql, values).execute(&self.pool).await?;

                tracing::debug!(
                    persistence_id = %id,
                    to_sequence_nr,
                    deleted = result.rows_affected(),
                    "Deleted events"
                );
                Ok(())
            }

            async fn highest_sequence_nr(&self, id: &PersistenceId) -> Result<i64> {
                use sqlx::Row;

                let (sql, values) = <$db_type>::build_select(&select_highest(&id.to_string()));
                let row = sqlx::query_with(&sql, values).fetch_one(&self.pool).await?;

                let max_seq: Option<i64> = row.try_get(0)?;
                Ok(max_seq.unwrap_or(0))
            }
        }
    };
}

// Generate implementations for each SQL backend
impl_event_store!(
    super::postgres::Postgres,
    "postgres",
    connection: sqlx::PgConnection,
    row: sqlx::postgres::PgRow
);
impl_event_store!(
    super::sqlite::Sqlite,
    "sqlite",
    connection: sqlx::SqliteConnection,
    row: sqlx::sqlite::SqliteRow
);
