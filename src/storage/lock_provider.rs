//! PessimisticLockProvider trait definition.

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::StorageError;
use crate::persistence_id::PersistenceId;

/// Serializes operations per identity.
///
/// The lock is acquired when the provider's transaction begins and released
/// when it ends: commit if the operation returns `Ok`, rollback if it returns
/// `Err`. Dropping the returned future or panicking inside the operation
/// rolls back as well. There is no separate release call, and a caller that
/// never finishes its operation blocks every other caller for the same
/// identity.
///
/// The operation receives the connection that holds the lock. Work issued
/// through it joins the locking transaction and commits or rolls back with it.
///
/// ```ignore
/// let total = locks
///     .with_lock(&id, |conn| {
///         Box::pin(async move {
///             sqlx::query("UPDATE counters SET n = n + 1").execute(&mut *conn).await?;
///             Ok::<_, StorageError>(1)
///         })
///     })
///     .await?;
/// ```
#[async_trait]
pub trait PessimisticLockProvider: Send + Sync {
    /// Connection handed to the operation while the lock is held.
    type Connection: Send;

    /// Run `operation` while holding the exclusive lock for `id`.
    ///
    /// Errors from `operation` are returned unchanged after rollback.
    async fn with_lock<R, E, F>(&self, id: &PersistenceId, operation: F) -> Result<R, E>
    where
        R: Send,
        E: From<StorageError> + Send,
        F: for<'c> FnOnce(&'c mut Self::Connection) -> BoxFuture<'c, Result<R, E>> + Send;
}
