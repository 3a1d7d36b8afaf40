//! Envelopes pairing payloads with positional and typing metadata.
//!
//! Stores persist the payload through a [`PayloadCodec`](crate::codec::PayloadCodec)
//! and keep the caller-supplied type tag beside it, so the tag is all that is
//! needed to pick a decoder on the way back.

use chrono::{DateTime, SubsecRound, Utc};
use indexmap::IndexMap;

use crate::persistence_id::PersistenceId;

/// Insertion-ordered string metadata attached to an event.
pub type Metadata = IndexMap<String, String>;

/// Current time at the precision every backend can store (microseconds).
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// A journal entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope<P> {
    pub persistence_id: PersistenceId,
    /// Caller-assigned position, unique per identity and greater than zero.
    pub sequence_nr: i64,
    /// Type tag used to select the decoder.
    pub event_type: String,
    pub event: P,
    pub timestamp: DateTime<Utc>,
    pub metadata: Metadata,
}

impl<P> EventEnvelope<P> {
    pub fn new(
        persistence_id: PersistenceId,
        sequence_nr: i64,
        event_type: impl Into<String>,
        event: P,
    ) -> Self {
        Self {
            persistence_id,
            sequence_nr,
            event_type: event_type.into(),
            event,
            timestamp: now(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Point-in-time state capture summarizing the journal up to `sequence_nr`.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEnvelope<P> {
    pub persistence_id: PersistenceId,
    pub sequence_nr: i64,
    pub state_type: String,
    pub state: P,
    pub timestamp: DateTime<Utc>,
}

impl<P> SnapshotEnvelope<P> {
    pub fn new(
        persistence_id: PersistenceId,
        sequence_nr: i64,
        state_type: impl Into<String>,
        state: P,
    ) -> Self {
        Self {
            persistence_id,
            sequence_nr,
            state_type: state_type.into(),
            state,
            timestamp: now(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Latest state of an entity, guarded by a version counter.
#[derive(Debug, Clone, PartialEq)]
pub struct DurableStateEnvelope<P> {
    pub persistence_id: PersistenceId,
    /// Version being committed; the stored row must currently hold `version - 1`.
    pub version: i64,
    pub state_type: String,
    pub state: P,
    pub timestamp: DateTime<Utc>,
}

impl<P> DurableStateEnvelope<P> {
    pub fn new(
        persistence_id: PersistenceId,
        version: i64,
        state_type: impl Into<String>,
        state: P,
    ) -> Self {
        Self {
            persistence_id,
            version,
            state_type: state_type.into(),
            state,
            timestamp: now(),
        }
    }

    /// Envelope for the write that follows this one.
    pub fn next(&self, state: P) -> Self {
        Self {
            persistence_id: self.persistence_id.clone(),
            version: self.version + 1,
            state_type: self.state_type.clone(),
            state,
            timestamp: now(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
