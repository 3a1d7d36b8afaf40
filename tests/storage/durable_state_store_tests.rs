//! DurableStateStore interface tests.
//!
//! These tests verify the contract of the DurableStateStore trait.
//! Each storage implementation should run these tests.

use std::time::Duration;

use angzarr_persistence::storage::{DurableStateStore, StorageError};
use angzarr_persistence::{DurableStateEnvelope, PersistenceId};

use super::{test_id, TestPayload};

/// Create a durable state envelope at the given version.
pub fn make_state(id: &PersistenceId, version: i64, value: i64) -> DurableStateEnvelope<TestPayload> {
    DurableStateEnvelope::new(id.clone(), version, "Counter", TestPayload::new("counter", value))
}

// =============================================================================
// DurableStateStore::get tests
// =============================================================================

pub async fn test_get_nonexistent<S: DurableStateStore<TestPayload>>(store: &S) {
    let id = test_id("test_counter");
    assert!(store.get(&id).await.expect("get should succeed").is_none());
}

// =============================================================================
// DurableStateStore::upsert tests
// =============================================================================

pub async fn test_first_upsert_inserts<S: DurableStateStore<TestPayload>>(store: &S) {
    let id = test_id("test_counter");
    let state = make_state(&id, 1, 10);

    store.upsert(&id, &state).await.expect("insert should succeed");

    assert_eq!(store.get(&id).await.unwrap(), Some(state));
}

pub async fn test_upsert_next_version<S: DurableStateStore<TestPayload>>(store: &S) {
    let id = test_id("test_counter");
    let v1 = make_state(&id, 1, 10);
    store.upsert(&id, &v1).await.unwrap();

    let v2 = v1.next(TestPayload::new("counter", 20));
    store.upsert(&id, &v2).await.expect("update should succeed");

    let v3 = v2.next(TestPayload::new("counter", 30));
    store.upsert(&id, &v3).await.expect("update should succeed");

    assert_eq!(store.get(&id).await.unwrap(), Some(v3));
}

pub async fn test_stale_version_conflict<S: DurableStateStore<TestPayload>>(store: &S) {
    let id = test_id("test_counter");
    let v1 = make_state(&id, 1, 10);
    store.upsert(&id, &v1).await.unwrap();
    let v2 = v1.next(TestPayload::new("counter", 20));
    store.upsert(&id, &v2).await.unwrap();

    // Another writer that also started from v1.
    let stale = v1.next(TestPayload::new("counter", 99));
    let err = store
        .upsert(&id, &stale)
        .await
        .expect_err("stale write should be rejected");

    assert!(err.is_conflict(), "expected conflict, got {err:?}");
    assert_eq!(err.persistence_id(), Some(&id));
    assert_eq!(err.expected(), Some(1));
    assert_eq!(store.get(&id).await.unwrap(), Some(v2), "row must be unchanged");
}

pub async fn test_version_gap_conflict<S: DurableStateStore<TestPayload>>(store: &S) {
    let id = test_id("test_counter");
    store.upsert(&id, &make_state(&id, 1, 10)).await.unwrap();

    let err = store
        .upsert(&id, &make_state(&id, 5, 50))
        .await
        .expect_err("skipping versions should be rejected");

    assert_eq!(err.expected(), Some(4));
    assert_eq!(store.get(&id).await.unwrap().unwrap().version, 1);
}

pub async fn test_repeated_first_insert_conflict<S: DurableStateStore<TestPayload>>(store: &S) {
    let id = test_id("test_counter");
    store.upsert(&id, &make_state(&id, 1, 10)).await.unwrap();

    let err = store
        .upsert(&id, &make_state(&id, 1, 11))
        .await
        .expect_err("second insert at version 1 should be rejected");

    assert_eq!(err.expected(), Some(0));
    assert_eq!(store.get(&id).await.unwrap().unwrap().state.value, 10);
}

pub async fn test_invalid_version_rejected<S: DurableStateStore<TestPayload>>(store: &S) {
    let id = test_id("test_counter");

    let err = store
        .upsert(&id, &make_state(&id, 0, 10))
        .await
        .expect_err("version 0 should be rejected");

    assert!(matches!(err, StorageError::InvalidVersion { version: 0, .. }));
    assert!(store.get(&id).await.unwrap().is_none());
}

pub async fn test_abandoned_upsert_keeps_version_chain<S: DurableStateStore<TestPayload>>(
    store: &S,
) {
    let id = test_id("test_counter");
    let v1 = make_state(&id, 1, 10);
    store.upsert(&id, &v1).await.unwrap();

    // Dropped after its first suspension point.
    let v2 = v1.next(TestPayload::new("counter", 20));
    let _ = tokio::time::timeout(Duration::ZERO, store.upsert(&id, &v2)).await;

    let current = store.get(&id).await.unwrap().expect("state should exist");
    assert!(
        current == v1 || current == v2,
        "abandoned upsert left a partial state: {current:?}"
    );

    let next = current.next(TestPayload::new("counter", 30));
    tokio::time::timeout(Duration::from_secs(10), store.upsert(&id, &next))
        .await
        .expect("store should not be left waiting on the abandoned upsert")
        .expect("upsert after an abandoned write should succeed");
    assert_eq!(store.get(&id).await.unwrap(), Some(next));
}

// =============================================================================
// DurableStateStore::delete tests
// =============================================================================

pub async fn test_delete_then_reinsert<S: DurableStateStore<TestPayload>>(store: &S) {
    let id = test_id("test_counter");
    let v1 = make_state(&id, 1, 10);
    store.upsert(&id, &v1).await.unwrap();
    store.upsert(&id, &v1.next(TestPayload::new("counter", 20))).await.unwrap();

    store.delete(&id).await.expect("delete should succeed");
    assert!(store.get(&id).await.unwrap().is_none());

    let fresh = make_state(&id, 1, 1);
    store
        .upsert(&id, &fresh)
        .await
        .expect("insert after delete should succeed");
    assert_eq!(store.get(&id).await.unwrap(), Some(fresh));
}

pub async fn test_delete_nonexistent<S: DurableStateStore<TestPayload>>(store: &S) {
    let id = test_id("test_counter");
    store
        .delete(&id)
        .await
        .expect("delete of missing state should succeed");
}

/// Run all DurableStateStore contract tests.
#[macro_export]
macro_rules! run_durable_state_store_tests {
    ($store:expr) => {
        use $crate::storage::durable_state_store_tests::*;

        // get tests
        test_get_nonexistent($store).await;
        println!("  test_get_nonexistent: PASSED");

        // upsert tests
        test_first_upsert_inserts($store).await;
        println!("  test_first_upsert_inserts: PASSED");

        test_upsert_next_version($store).await;
        println!("  test_upsert_next_version: PASSED");

        test_stale_version_conflict($store).await;
        println!("  test_stale_version_conflict: PASSED");

        test_version_gap_conflict($store).await;
        println!("  test_version_gap_conflict: PASSED");

        test_repeated_first_insert_conflict($store).await;
        println!("  test_repeated_first_insert_conflict: PASSED");

        test_invalid_version_rejected($store).await;
        println!("  test_invalid_version_rejected: PASSED");

        test_abandoned_upsert_keeps_version_chain($store).await;
        println!("  test_abandoned_upsert_keeps_version_chain: PASSED");

        // delete tests
        test_delete_then_reinsert($store).await;
        println!("  test_delete_then_reinsert: PASSED");

        test_delete_nonexistent($store).await;
        println!("  test_delete_nonexistent: PASSED");
    };
}
