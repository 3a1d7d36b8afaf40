//! Mock PessimisticLockProvider implementation for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::Mutex;

use crate::persistence_id::PersistenceId;
use crate::storage::{PessimisticLockProvider, StorageError};

/// In-process lock provider: one async mutex per identity.
///
/// There is no transaction, so the operation gets a unit connection and
/// nothing is undone when it fails.
#[derive(Default)]
pub struct MockLockProvider {
    locks: Mutex<HashMap<PersistenceId, Arc<Mutex<()>>>>,
}

impl MockLockProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PessimisticLockProvider for MockLockProvider {
    type Connection = ();

    async fn with_lock<R, E, F>(&self, id: &PersistenceId, operation: F) -> Result<R, E>
    where
        R: Send,
        E: From<StorageError> + Send,
        F: for<'c> FnOnce(&'c mut Self::Connection) -> BoxFuture<'c, Result<R, E>> + Send,
    {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(id.clone()).or_default())
        };

        let _guard = lock.lock().await;
        operation(&mut ()).await
    }
}
