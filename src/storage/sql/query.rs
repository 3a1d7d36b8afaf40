//! SQL database abstraction trait.

use sea_query::{DeleteStatement, InsertStatement, SelectStatement, UpdateStatement};
use sea_query_binder::SqlxValues;

/// Trait for SQL database backends.
///
/// This trait abstracts over different SQL databases (PostgreSQL, SQLite)
/// by providing the pool type, the engine-specific transaction and locking
/// behaviour, and query building with bound parameters.
pub trait SqlDatabase: Send + Sync + 'static {
    /// The connection pool type for this database.
    type Pool: Clone + Send + Sync;

    /// Statement passed to `Connection::begin_with` to open a writing
    /// transaction.
    const BEGIN: &'static str;

    /// Whether the engine supports `SELECT ... FOR UPDATE` row locks. Engines
    /// without them rely on `BEGIN` taking a database-wide write lock.
    const ROW_LOCKS: bool;

    /// DDL creating the persistence tables, one statement per entry.
    const CREATE_SCHEMA: &'static [&'static str];

    /// Build a SQL query and its bind values from a sea-query SELECT statement.
    fn build_select(stmt: &SelectStatement) -> (String, SqlxValues);

    /// Build a SQL query and its bind values from a sea-query INSERT statement.
    fn build_insert(stmt: &InsertStatement) -> (String, SqlxValues);

    /// Build a SQL query and its bind values from a sea-query UPDATE statement.
    fn build_update(stmt: &UpdateStatement) -> (String, SqlxValues);

    /// Build a SQL query and its bind values from a sea-query DELETE statement.
    fn build_delete(stmt: &DeleteStatement) -> (String, SqlxValues);
}
