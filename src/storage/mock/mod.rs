//! Mock storage implementations for testing.

mod durable_state_store;
mod event_store;
mod lock_provider;
mod snapshot_store;

pub use durable_state_store::MockDurableStateStore;
pub use event_store::MockEventStore;
pub use lock_provider::MockLockProvider;
pub use snapshot_store::MockSnapshotStore;
