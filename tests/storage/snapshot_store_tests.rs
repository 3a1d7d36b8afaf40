//! SnapshotStore interface tests.
//!
//! These tests verify the contract of the SnapshotStore trait.
//! Each storage implementation should run these tests.

use angzarr_persistence::storage::{SnapshotStore, StorageError};
use angzarr_persistence::{PersistenceId, SnapshotEnvelope};

use super::{test_id, TestPayload};

/// Create a test snapshot at the given sequence.
pub fn make_snapshot(id: &PersistenceId, seq: i64) -> SnapshotEnvelope<TestPayload> {
    SnapshotEnvelope::new(
        id.clone(),
        seq,
        "CartState",
        TestPayload::new(&format!("state-{seq}"), seq),
    )
}

async fn latest_seq<S: SnapshotStore<TestPayload>>(store: &S, id: &PersistenceId) -> Option<i64> {
    store
        .load(id)
        .await
        .expect("load should succeed")
        .map(|s| s.sequence_nr)
}

// =============================================================================
// SnapshotStore::load tests
// =============================================================================

pub async fn test_load_nonexistent<S: SnapshotStore<TestPayload>>(store: &S) {
    let id = test_id("test_cart");
    assert!(latest_seq(store, &id).await.is_none(), "nonexistent snapshot should be None");
}

pub async fn test_save_and_load_roundtrip<S: SnapshotStore<TestPayload>>(store: &S) {
    let id = test_id("test_cart");
    let snapshot = make_snapshot(&id, 7);

    store.save(&id, &snapshot).await.expect("save should succeed");

    let loaded = store
        .load(&id)
        .await
        .expect("load should succeed")
        .expect("snapshot should exist");
    assert_eq!(loaded, snapshot);
}

pub async fn test_load_returns_latest<S: SnapshotStore<TestPayload>>(store: &S) {
    let id = test_id("test_cart");

    for seq in [5, 10, 15] {
        store.save(&id, &make_snapshot(&id, seq)).await.unwrap();
    }

    let latest = store.load(&id).await.unwrap().expect("snapshot should exist");
    assert_eq!(latest.sequence_nr, 15);
    assert_eq!(latest.state, TestPayload::new("state-15", 15));
}

pub async fn test_load_latest_saved_out_of_order<S: SnapshotStore<TestPayload>>(store: &S) {
    let id = test_id("test_cart");

    store.save(&id, &make_snapshot(&id, 10)).await.unwrap();
    store.save(&id, &make_snapshot(&id, 5)).await.unwrap();

    assert_eq!(latest_seq(store, &id).await, Some(10));
}

// =============================================================================
// SnapshotStore::save tests
// =============================================================================

pub async fn test_duplicate_snapshot_rejected<S: SnapshotStore<TestPayload>>(store: &S) {
    let id = test_id("test_cart");
    let first = make_snapshot(&id, 5);
    store.save(&id, &first).await.unwrap();

    let mut second = make_snapshot(&id, 5);
    second.state = TestPayload::new("other", 99);
    let err = store
        .save(&id, &second)
        .await
        .expect_err("second snapshot at the same sequence should fail");

    assert!(
        matches!(err, StorageError::DuplicateSnapshot { sequence_nr: 5, .. }),
        "unexpected error: {err:?}"
    );
    assert_eq!(store.load(&id).await.unwrap(), Some(first));
}

// =============================================================================
// SnapshotStore::delete tests
// =============================================================================

pub async fn test_delete_up_to<S: SnapshotStore<TestPayload>>(store: &S) {
    let id = test_id("test_cart");
    for seq in [5, 10, 15] {
        store.save(&id, &make_snapshot(&id, seq)).await.unwrap();
    }

    store.delete(&id, 10).await.expect("delete should succeed");
    assert_eq!(latest_seq(store, &id).await, Some(15));

    store.delete(&id, 15).await.unwrap();
    assert_eq!(latest_seq(store, &id).await, None);
}

pub async fn test_delete_below_all<S: SnapshotStore<TestPayload>>(store: &S) {
    let id = test_id("test_cart");
    store.save(&id, &make_snapshot(&id, 5)).await.unwrap();

    store.delete(&id, 4).await.unwrap();
    assert_eq!(latest_seq(store, &id).await, Some(5));
}

pub async fn test_delete_nonexistent<S: SnapshotStore<TestPayload>>(store: &S) {
    let id = test_id("test_cart");
    store
        .delete(&id, 100)
        .await
        .expect("delete of missing snapshots should succeed");
}

/// Run all SnapshotStore contract tests.
#[macro_export]
macro_rules! run_snapshot_store_tests {
    ($store:expr) => {
        use $crate::storage::snapshot_store_tests::*;

        // load tests
        test_load_nonexistent($store).await;
        println!("  test_load_nonexistent: PASSED");

        test_save_and_load_roundtrip($store).await;
        println!("  test_save_and_load_roundtrip: PASSED");

        test_load_returns_latest($store).await;
        println!("  test_load_returns_latest: PASSED");

        test_load_latest_saved_out_of_order($store).await;
        println!("  test_load_latest_saved_out_of_order: PASSED");

        // save tests
        test_duplicate_snapshot_rejected($store).await;
        println!("  test_duplicate_snapshot_rejected: PASSED");

        // delete tests
        test_delete_up_to($store).await;
        println!("  test_delete_up_to: PASSED");

        test_delete_below_all($store).await;
        println!("  test_delete_below_all: PASSED");

        test_delete_nonexistent($store).await;
        println!("  test_delete_nonexistent: PASSED");
    };
}
