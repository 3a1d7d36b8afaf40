//! Shared storage contract tests.
//!
//! Tests the EventStore, SnapshotStore, DurableStateStore and
//! PessimisticLockProvider interfaces against all implementations.
//! Each implementation module imports these test functions and runs them.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use angzarr_persistence::PersistenceId;

pub mod durable_state_store_tests;
pub mod lock_provider_tests;
pub mod snapshot_store_tests;

/// Payload used by every contract test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestPayload {
    pub name: String,
    pub value: i64,
}

impl TestPayload {
    pub fn new(name: &str, value: i64) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }
}

/// Fresh identity so tests sharing a database never see each other's rows.
pub fn test_id(entity_type: &str) -> PersistenceId {
    PersistenceId::new(entity_type, Uuid::new_v4().to_string())
}
