//! PessimisticLockProvider interface tests.
//!
//! These tests verify the contract of the PessimisticLockProvider trait.
//! Operations here never touch the connection, so every provider can run
//! them; engine-specific checks live in the per-backend test files. Callers
//! that are dropped or panic while holding the lock must release it.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::FutureExt;

use angzarr_persistence::storage::{PessimisticLockProvider, StorageError};

use super::test_id;

/// Caller-defined error type passed through `with_lock` untouched.
#[derive(Debug)]
pub enum TestError {
    Rejected(&'static str),
    Storage(StorageError),
}

impl From<StorageError> for TestError {
    fn from(err: StorageError) -> Self {
        TestError::Storage(err)
    }
}

pub async fn test_with_lock_returns_value<L: PessimisticLockProvider>(locks: &L) {
    let id = test_id("test_lock");

    let value: i32 = locks
        .with_lock(&id, |_conn| Box::pin(async { Ok::<_, StorageError>(42) }))
        .await
        .expect("with_lock should succeed");

    assert_eq!(value, 42);
}

pub async fn test_with_lock_serializes_same_identity<L: PessimisticLockProvider>(locks: &L) {
    let id = test_id("test_lock");
    let inside = Arc::new(AtomicBool::new(false));
    let completed = Arc::new(AtomicUsize::new(0));

    let calls = (0..4).map(|_| {
        let inside = Arc::clone(&inside);
        let completed = Arc::clone(&completed);
        locks.with_lock(&id, move |_conn| {
            Box::pin(async move {
                assert!(
                    !inside.swap(true, Ordering::SeqCst),
                    "critical sections overlapped"
                );
                tokio::time::sleep(Duration::from_millis(20)).await;
                inside.store(false, Ordering::SeqCst);
                completed.fetch_add(1, Ordering::SeqCst);
                Ok::<_, StorageError>(())
            })
        })
    });

    for result in join_all(calls).await {
        result.expect("with_lock should succeed");
    }
    assert_eq!(completed.load(Ordering::SeqCst), 4);
}

pub async fn test_with_lock_returns_operation_error<L: PessimisticLockProvider>(locks: &L) {
    let id = test_id("test_lock");

    let result: Result<(), TestError> = locks
        .with_lock(&id, |_conn| {
            Box::pin(async { Err(TestError::Rejected("insufficient funds")) })
        })
        .await;

    assert!(
        matches!(result, Err(TestError::Rejected("insufficient funds"))),
        "unexpected result: {result:?}"
    );
}

pub async fn test_with_lock_released_after_error<L: PessimisticLockProvider>(locks: &L) {
    let id = test_id("test_lock");

    let _ = locks
        .with_lock(&id, |_conn| {
            Box::pin(async { Err::<(), _>(TestError::Rejected("first")) })
        })
        .await;

    let value: &str = locks
        .with_lock(&id, |_conn| Box::pin(async { Ok::<_, TestError>("second") }))
        .await
        .expect("lock should be free after a failed operation");
    assert_eq!(value, "second");
}

pub async fn test_abandoned_lock_is_released<L: PessimisticLockProvider>(locks: &L) {
    let id = test_id("test_lock");

    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        locks.with_lock(&id, |_conn| {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, StorageError>(())
            })
        }),
    )
    .await;
    assert!(abandoned.is_err(), "operation should still be running when dropped");

    let value: i32 = tokio::time::timeout(
        Duration::from_secs(10),
        locks.with_lock(&id, |_conn| Box::pin(async { Ok::<_, StorageError>(7) })),
    )
    .await
    .expect("lock should be free once the holder is dropped")
    .expect("with_lock should succeed");
    assert_eq!(value, 7);
}

pub async fn test_panicking_operation_releases_lock<L: PessimisticLockProvider>(locks: &L) {
    let id = test_id("test_lock");

    let panicked = AssertUnwindSafe(locks.with_lock(&id, |_conn| {
        Box::pin(async {
            if true {
                panic!("operation failed mid-way");
            }
            Ok::<_, StorageError>(())
        })
    }))
    .catch_unwind()
    .await;
    assert!(panicked.is_err(), "panic should propagate to the caller");

    let value: &str = tokio::time::timeout(
        Duration::from_secs(10),
        locks.with_lock(&id, |_conn| Box::pin(async { Ok::<_, StorageError>("after") })),
    )
    .await
    .expect("lock should be free after a panicking holder")
    .expect("with_lock should succeed");
    assert_eq!(value, "after");
}

pub async fn test_with_lock_distinct_identities<L: PessimisticLockProvider>(locks: &L) {
    let first = test_id("test_lock");
    let second = test_id("test_lock");

    let a: i32 = locks
        .with_lock(&first, |_conn| Box::pin(async { Ok::<_, StorageError>(1) }))
        .await
        .unwrap();
    let b: i32 = locks
        .with_lock(&second, |_conn| Box::pin(async { Ok::<_, StorageError>(2) }))
        .await
        .unwrap();

    assert_eq!(a + b, 3);
}

/// Run all PessimisticLockProvider contract tests.
#[macro_export]
macro_rules! run_lock_provider_tests {
    ($locks:expr) => {
        use $crate::storage::lock_provider_tests::*;

        test_with_lock_returns_value($locks).await;
        println!("  test_with_lock_returns_value: PASSED");

        test_with_lock_serializes_same_identity($locks).await;
        println!("  test_with_lock_serializes_same_identity: PASSED");

        test_with_lock_returns_operation_error($locks).await;
        println!("  test_with_lock_returns_operation_error: PASSED");

        test_with_lock_released_after_error($locks).await;
        println!("  test_with_lock_released_after_error: PASSED");

        test_with_lock_distinct_identities($locks).await;
        println!("  test_with_lock_distinct_identities: PASSED");

        test_abandoned_lock_is_released($locks).await;
        println!("  test_abandoned_lock_is_released: PASSED");

        test_panicking_operation_releases_lock($locks).await;
        println!("  test_panicking_operation_releases_lock: PASSED");
    };
}
